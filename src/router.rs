//! The inbound datapoint router.
//!
//! Validates an inbound datapoint unit against the registry and decodes it for the owning
//! entities. Anything that cannot be delivered is dropped and reported as a [`Diagnostic`].

use log::{trace, warn};

use crate::{
    error::DatapointError,
    registry::{BindingHandle, Owners, Registry},
    types::{DatapointNumber, DatapointType, DatapointValue, WireType},
};

/// A decoded inbound value, ready to hand to its owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub handle: BindingHandle,
    pub value: DatapointValue,
    pub owners: Owners,
}

/// Diagnostic events surfaced by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A `Detect` binding was bound to the observed wire type.
    Detected {
        number: DatapointNumber,
        wire_type: WireType,
    },
    /// An inbound message was dropped without reaching any entity.
    Dropped {
        number: DatapointNumber,
        reason: DatapointError,
    },
    /// A status payload ended inside a datapoint unit. The remaining bytes were discarded.
    Truncated { remaining: usize },
}

/// Counters of routed and dropped messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub delivered: u32,
    pub dropped: u32,
}

/// Routes inbound datapoint units.
#[derive(Debug, Default)]
pub struct Router {
    stats: RouterStats,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Resolve and decode one inbound message.
    ///
    /// The payload is decoded before the binding is resolved, so a malformed message never
    /// rebinds a `Detect` datapoint. The returned diagnostic, if any, reports a detection.
    pub fn on_message(
        &mut self,
        registry: &mut Registry,
        number: DatapointNumber,
        type_code: u8,
        raw: &[u8],
    ) -> Result<(Delivery, Option<Diagnostic>), Diagnostic> {
        match Self::route(registry, number, type_code, raw) {
            Ok(routed) => {
                self.stats.delivered = self.stats.delivered.wrapping_add(1);
                Ok(routed)
            }
            Err(reason) => {
                self.stats.dropped = self.stats.dropped.wrapping_add(1);
                warn!("[DP{}] Dropping message: {}", number, reason);
                Err(Diagnostic::Dropped { number, reason })
            }
        }
    }

    fn route(
        registry: &mut Registry,
        number: DatapointNumber,
        type_code: u8,
        raw: &[u8],
    ) -> Result<(Delivery, Option<Diagnostic>), DatapointError> {
        let wire_type =
            WireType::from_code(type_code).ok_or(DatapointError::UnknownWireType(type_code))?;
        if registry.get(number).is_none() {
            return Err(DatapointError::UnknownDatapoint(number));
        }

        let value = DatapointValue::decode(wire_type, raw)?;
        let was_detect = registry.declared_type(number) == Some(DatapointType::Detect);
        let handle = registry.resolve(number, wire_type)?;
        let owners = registry
            .binding(handle)
            .map(|binding| binding.owners().iter().copied().collect())
            .unwrap_or_default();

        trace!("[DP{}] Routing {:?}", number, value);
        let diagnostic = was_detect.then_some(Diagnostic::Detected { number, wire_type });
        Ok((
            Delivery {
                handle,
                value,
                owners,
            },
            diagnostic,
        ))
    }
}
