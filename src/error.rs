//! Our error types for the Uyat datapoint core.

use thiserror::Error;

use crate::types::{DatapointNumber, DatapointType, EntityId, WireType};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors raised while binding, resolving or decoding datapoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatapointError {
    /// Two incompatible bindings on one datapoint. Fatal at configuration time.
    #[error("Datapoint {number} is bound as {existing:?}, cannot bind as {requested:?}")]
    Conflict {
        number: DatapointNumber,
        existing: DatapointType,
        requested: DatapointType,
    },
    /// An inbound message disagrees with the resolved binding. The message is dropped.
    #[error("Datapoint {number} is bound as {expected:?} but a {observed:?} message was received")]
    TypeMismatch {
        number: DatapointNumber,
        expected: DatapointType,
        observed: WireType,
    },
    #[error("Datapoint {0} is not registered")]
    UnknownDatapoint(DatapointNumber),
    #[error("Unknown wire type code {0:#04x}")]
    UnknownWireType(u8),
    #[error("Malformed {wire_type:?} payload of {len} bytes")]
    Malformed { wire_type: WireType, len: usize },
    #[error("Truncated datapoint unit, {0} bytes left")]
    Truncated(usize),
    #[error("Datapoint {0} has too many owners")]
    TooManyOwners(DatapointNumber),
    /// Outbound writes need a concrete type, a `Detect` binding has not seen a message yet.
    #[error("Type of datapoint {0} has not been detected yet")]
    Unresolved(DatapointNumber),
    #[error("Value does not fit datapoint {number} of type {datapoint_type:?}")]
    ValueOutOfRange {
        number: DatapointNumber,
        datapoint_type: DatapointType,
    },
}

/// Errors raised while building entity and retry configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid range")]
    InvalidRange,
    #[error("Retry count must be between 1 and 255")]
    InvalidRetryCount,
    #[error("Retry timeout must not be zero")]
    InvalidTimeout,
    #[error("Datapoint type {0:?} is not allowed here")]
    UnsupportedType(DatapointType),
    #[error("Option value {0} is mapped more than once")]
    DuplicateOption(u8),
    #[error("Label of option {0} is already used")]
    DuplicateLabel(u8),
    #[error("No options configured")]
    EmptyMapping,
    #[error("Entity has no datapoint configured")]
    MissingDatapoint,
    #[error("Sensor scale must be between 0 and 6")]
    InvalidScale,
}

/// Errors raised while applying an intent to an entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("Entity does not accept this intent")]
    Unsupported,
    #[error("Unknown option {0:?}")]
    UnknownOption(alloc::string::String),
    #[error(transparent)]
    Datapoint(#[from] DatapointError),
}

/// Custom error type for the datapoint device runtime.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Datapoint error: {0}")]
    Datapoint(#[from] DatapointError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Intent error: {0}")]
    Intent(#[from] IntentError),
    #[error("Unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("Too many entities")]
    TooManyEntities,
}
