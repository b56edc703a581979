//! The boundary with the serial transport.
//!
//! The vendor framing and checksum are handled by the transport. What crosses this boundary are
//! datapoint units: the datapoint number, its wire type code, a big endian `u16` length and the
//! encoded value.

use embedded_io::ErrorKind;
use thiserror::Error;

use crate::{
    error::DatapointError,
    types::{DatapointNumber, WireType},
};

/// Size of a datapoint unit header: number, type code and length.
pub const UNIT_HEADER_LEN: usize = 4;

/// Outbound side of the transport.
pub trait Transport {
    type Error: embedded_io::Error;

    /// Transmit one encoded datapoint value to the MCU.
    fn transmit(
        &mut self,
        number: DatapointNumber,
        wire_type: WireType,
        payload: &[u8],
    ) -> Result<(), Self::Error>;
}

impl<T: Transport> Transport for &mut T {
    type Error = T::Error;

    fn transmit(
        &mut self,
        number: DatapointNumber,
        wire_type: WireType,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        (**self).transmit(number, wire_type, payload)
    }
}

/// Errors of [`SerialTransport`].
#[derive(Error, Debug)]
pub enum SerialTransportError<E: embedded_io::Error> {
    #[error("Serial communication error")]
    Serial(E),
    #[error("Payload of {0} bytes does not fit a datapoint unit")]
    Oversized(usize),
}

impl<E: embedded_io::Error> embedded_io::Error for SerialTransportError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Serial(err) => err.kind(),
            Self::Oversized(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Writes datapoint units to any interface implementing [`embedded_io::Write`].
pub struct SerialTransport<S: embedded_io::Write> {
    interface: S,
}

impl<S: embedded_io::Write> SerialTransport<S> {
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    pub fn into_inner(self) -> S {
        self.interface
    }
}

impl<S: embedded_io::Write> Transport for SerialTransport<S> {
    type Error = SerialTransportError<S::Error>;

    fn transmit(
        &mut self,
        number: DatapointNumber,
        wire_type: WireType,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        let len = u16::try_from(payload.len())
            .map_err(|_| SerialTransportError::Oversized(payload.len()))?;
        let [len_high, len_low] = len.to_be_bytes();
        let header = [number, wire_type.code(), len_high, len_low];

        self.interface
            .write_all(&header)
            .map_err(SerialTransportError::Serial)?;
        self.interface
            .write_all(payload)
            .map_err(SerialTransportError::Serial)?;
        self.interface.flush().map_err(SerialTransportError::Serial)
    }
}

/// One datapoint unit borrowed from a status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatapointUnit<'a> {
    pub number: DatapointNumber,
    /// Raw type code, validated by the router.
    pub type_code: u8,
    pub value: &'a [u8],
}

/// Iterator over the datapoint units of a status payload.
///
/// Stops after the first truncated unit.
pub struct DatapointUnits<'a> {
    remaining: &'a [u8],
}

impl<'a> DatapointUnits<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { remaining: payload }
    }
}

impl<'a> Iterator for DatapointUnits<'a> {
    type Item = Result<DatapointUnit<'a>, DatapointError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let truncated = DatapointError::Truncated(self.remaining.len());
        let Some((header, rest)) = self.remaining.split_first_chunk::<UNIT_HEADER_LEN>() else {
            self.remaining = &[];
            return Some(Err(truncated));
        };
        let [number, type_code, len_high, len_low] = *header;
        let len = usize::from(u16::from_be_bytes([len_high, len_low]));
        if rest.len() < len {
            self.remaining = &[];
            return Some(Err(truncated));
        }

        let (value, rest) = rest.split_at(len);
        self.remaining = rest;
        Some(Ok(DatapointUnit {
            number,
            type_code,
            value,
        }))
    }
}
