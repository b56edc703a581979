//! We use this mocking module in unit tests to emulate the serial link to the MCU.

use alloc::vec::Vec;
use thiserror::Error;

use crate::{
    transport::Transport,
    types::{DatapointNumber, DatapointValue, WireType},
};

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 256>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
}

#[derive(Error, Debug)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    #[error("Buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with an empty buffer
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            should_error_on_write: false,
        }
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }
}

/// One transmission recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub number: DatapointNumber,
    pub wire_type: WireType,
    pub payload: Vec<u8>,
}

impl Transmission {
    /// Decode the payload back into a value.
    pub fn value(&self) -> DatapointValue {
        DatapointValue::decode(self.wire_type, &self.payload).unwrap()
    }
}

/// A transport that records every transmission instead of writing bytes.
#[derive(Default)]
pub struct MockTransport {
    pub transmissions: Vec<Transmission>,
    /// Flag to simulate a transport that drops the link
    pub should_error: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmissions made for one datapoint.
    pub fn sent_to(&self, number: DatapointNumber) -> Vec<&Transmission> {
        self.transmissions
            .iter()
            .filter(|transmission| transmission.number == number)
            .collect()
    }

    pub fn last(&self) -> Option<&Transmission> {
        self.transmissions.last()
    }
}

impl Transport for MockTransport {
    type Error = MockSerialError;

    fn transmit(
        &mut self,
        number: DatapointNumber,
        wire_type: WireType,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        if self.should_error {
            return Err(MockSerialError::SimulatedError);
        }
        self.transmissions.push(Transmission {
            number,
            wire_type,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert!(!mock.should_error_on_write);
    }

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write(b"Hello, ").unwrap();
        mock.write(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 300]; // Larger than 256 byte capacity

        let result = mock.write(&large_data);
        assert!(matches!(result, Err(MockSerialError::BufferOverflow)));
    }

    #[test]
    fn test_write_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);

        assert!(matches!(mock.write(b"test"), Err(MockSerialError::SimulatedError)));
        assert!(mock.flush().is_err());
        assert_eq!(mock.written_data().len(), 0); // Nothing should be written
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_mock_transport_records() {
        let mut transport = MockTransport::new();
        transport.transmit(1, WireType::Bool, &[0x01]).unwrap();
        transport.transmit(2, WireType::Enum, &[0x02]).unwrap();

        assert_eq!(transport.sent_to(1).len(), 1);
        assert_eq!(transport.last().unwrap().value(), DatapointValue::Enum(2));

        transport.should_error = true;
        assert!(transport.transmit(1, WireType::Bool, &[0x00]).is_err());
        assert_eq!(transport.transmissions.len(), 2);
    }
}
