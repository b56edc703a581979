//! Toggles a switch datapoint over a serial port carrying bare datapoint units.
//!
//! Frame encapsulation is expected to be done by whatever sits on the other end of the port.

use std::{
    env,
    io::{ErrorKind, Read},
    time::Duration,
};

use inquire::Select;
use serialport::SerialPort;
use uyat_datapoints::{
    Device, Event, Instant, RetryConfig, Timeout,
    entity::{Intent, Switch, SwitchConfig},
    transport::SerialTransport,
};

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 9600;
const SERIAL_TIMEOUT_MS: u64 = 50;
const SWITCH_DATAPOINT: u8 = 1;
const RETRY_COUNT: u8 = 3;
const RETRY_TIMEOUT_MS: u32 = 300;
const RUN_TIME_MS: u64 = 5000;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");
    let mut reader = port.try_clone().expect("Failed to clone serial port");

    let started = std::time::Instant::now();
    let now = || Instant::from_ticks(started.elapsed().as_millis() as u64);

    let mut device = Device::new(SerialTransport::new(PortWrapper(port)));
    let retry = RetryConfig::new(RETRY_COUNT, Timeout::millis(RETRY_TIMEOUT_MS)).unwrap();
    let switch = device
        .add_entity(Switch::new(SwitchConfig::new(SWITCH_DATAPOINT).with_retry(retry)).unwrap())
        .unwrap();
    device.start(now()).unwrap();

    device.command(switch, Intent::Switch(true), now()).unwrap();
    println!("Switch on requested");

    let mut buffer = [0u8; 256];
    while started.elapsed() < Duration::from_millis(RUN_TIME_MS) {
        match reader.read(&mut buffer) {
            Ok(len) if len > 0 => device.deliver_units(&buffer[..len], now()),
            Ok(_) => device.poll(now()),
            Err(err) if err.kind() == ErrorKind::TimedOut => device.poll(now()),
            Err(err) => panic!("Serial read failed: {}", err),
        }

        while let Some(event) = device.pop_event() {
            match event {
                Event::StateChanged(id) => {
                    let state = device
                        .entity(id)
                        .and_then(|entity| entity.as_switch()?.state());
                    println!("Switch state: {:?}", state);
                }
                other => println!("{:?}", other),
            }
        }
    }
}
