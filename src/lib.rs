//! This crate implements the datapoint core of the Uyat (Tuya compatible) MCU serial protocol.
//!
//! It supports `no_std` environments with `alloc` by use of the `no_std` feature flag.
//!
//! The MCU exposes its state as numbered, typed datapoints. This crate keeps track of which
//! entity owns which datapoint, routes inbound reports to those entities, and turns entity
//! intents into datapoint writes with optional acknowledgement tracking and retries.
//!
//! Supported entities:
//! * Light (binary, dimmer, CT, RGB and RGBCT shapes)
//! * Fan
//! * Switch
//! * Sensor, including voltage/current/power records
//! * Text sensor
//! * Select
//! * Number
//! * Climate, with presets, swing and fan modes
//!
//! The crate is sans-IO: the vendor frame layer is left to the caller, which hands inbound
//! datapoint units to [`device::Device`] and provides a [`transport::Transport`] for outbound
//! writes. [`transport::SerialTransport`] writes datapoint units to any [`embedded_io::Write`].
//! Time is passed in explicitly, retries are driven by [`device::Device::poll`].
//!
//! Datapoint types on the wire:
//! | Code | Type    | Payload                     |
//! |------|---------|-----------------------------|
//! | 0x00 | Raw     | any number of bytes         |
//! | 0x01 | Bool    | 1 byte                      |
//! | 0x02 | Value   | 4 bytes, big endian         |
//! | 0x03 | String  | any number of bytes, UTF-8  |
//! | 0x04 | Enum    | 1 byte                      |
//! | 0x05 | Bitmask | 1, 2 or 4 bytes, big endian |

#![cfg_attr(feature = "no_std", no_std)]

extern crate alloc;

pub mod device;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod registry;
pub mod retry;
pub mod router;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;

pub use device::{Device, Event};
pub use error::{ConfigError, DatapointError, Error, IntentError};
pub use retry::RetryConfig;
pub use types::{DatapointNumber, DatapointType, DatapointValue, EntityId, Instant, Timeout, WireType};
