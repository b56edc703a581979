//! The datapoint registry, mapping datapoint numbers to their declared type and owning entities.

use log::info;

use crate::{
    error::DatapointError,
    types::{DatapointNumber, DatapointType, EntityId, WireType},
};

/// Maximum number of entities that may share one datapoint.
pub const MAX_OWNERS: usize = 8;

/// Entities owning a binding.
pub type Owners = heapless::Vec<EntityId, MAX_OWNERS>;

/// Lookup key of a binding. Entities keep this, never a copy of the binding itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(DatapointNumber);

impl BindingHandle {
    pub const fn number(self) -> DatapointNumber {
        self.0
    }
}

/// A datapoint number bound to a declared type and the entities using it.
#[derive(Debug, Clone)]
pub struct Binding {
    number: DatapointNumber,
    datapoint_type: DatapointType,
    owners: Owners,
}

impl Binding {
    pub fn number(&self) -> DatapointNumber {
        self.number
    }

    /// Current type of the binding. A detected binding reports the observed type.
    pub fn datapoint_type(&self) -> DatapointType {
        self.datapoint_type
    }

    pub fn owners(&self) -> &[EntityId] {
        &self.owners
    }

    pub fn handle(&self) -> BindingHandle {
        BindingHandle(self.number)
    }
}

/// Direct-indexed table of all datapoint bindings of a device.
#[derive(Debug, Clone)]
pub struct Registry {
    table: [Option<Binding>; 256],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            table: core::array::from_fn(|_| None),
        }
    }

    /// Bind `number` to `datapoint_type` on behalf of `owner`.
    ///
    /// Registering the same number again is allowed as long as the types agree. A concrete type
    /// replaces `Any` or `Detect`, two different concrete types are a [`DatapointError::Conflict`].
    /// The registry is left untouched when an error is returned.
    pub fn register(
        &mut self,
        number: DatapointNumber,
        datapoint_type: DatapointType,
        owner: EntityId,
    ) -> Result<BindingHandle, DatapointError> {
        let index = usize::from(number);
        match self.table[index].as_mut() {
            None => {
                let mut owners = Owners::new();
                // A fresh list always has room for one owner.
                let _ = owners.push(owner);
                self.table[index] = Some(Binding {
                    number,
                    datapoint_type,
                    owners,
                });
            }
            Some(binding) => {
                let merged = merge(binding.datapoint_type, datapoint_type).ok_or(
                    DatapointError::Conflict {
                        number,
                        existing: binding.datapoint_type,
                        requested: datapoint_type,
                    },
                )?;
                if !binding.owners.contains(&owner) {
                    binding
                        .owners
                        .push(owner)
                        .map_err(|_| DatapointError::TooManyOwners(number))?;
                }
                binding.datapoint_type = merged;
            }
        }
        Ok(BindingHandle(number))
    }

    /// Resolve an inbound message of the observed type against the binding of `number`.
    ///
    /// A `Detect` binding is permanently rebound to the observed type on its first message.
    pub fn resolve(
        &mut self,
        number: DatapointNumber,
        observed: WireType,
    ) -> Result<BindingHandle, DatapointError> {
        let binding = self.table[usize::from(number)]
            .as_mut()
            .ok_or(DatapointError::UnknownDatapoint(number))?;

        match binding.datapoint_type {
            DatapointType::Detect => {
                binding.datapoint_type = observed.into();
                info!("[DP{}] Detected datapoint type {:?}", number, observed);
            }
            DatapointType::Any => {}
            expected if !expected.accepts(observed) => {
                return Err(DatapointError::TypeMismatch {
                    number,
                    expected,
                    observed,
                });
            }
            _ => {}
        }
        Ok(BindingHandle(number))
    }

    pub fn get(&self, number: DatapointNumber) -> Option<&Binding> {
        self.table[usize::from(number)].as_ref()
    }

    pub fn binding(&self, handle: BindingHandle) -> Option<&Binding> {
        self.get(handle.number())
    }

    pub fn declared_type(&self, number: DatapointNumber) -> Option<DatapointType> {
        self.get(number).map(Binding::datapoint_type)
    }

    /// Concrete wire type to use for an outbound write on `number`.
    ///
    /// `Any` bindings write with `fallback`, `Detect` bindings cannot be written until resolved.
    pub fn outbound_type(
        &self,
        number: DatapointNumber,
        fallback: WireType,
    ) -> Result<WireType, DatapointError> {
        match self.declared_type(number) {
            None => Err(DatapointError::UnknownDatapoint(number)),
            Some(DatapointType::Detect) => Err(DatapointError::Unresolved(number)),
            Some(DatapointType::Any) => Ok(fallback),
            Some(concrete) => Ok(concrete.concrete().unwrap_or(fallback)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.table.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Combine two declared types for one datapoint, `None` if they are incompatible.
fn merge(existing: DatapointType, requested: DatapointType) -> Option<DatapointType> {
    use DatapointType as DT;
    match (existing, requested) {
        (a, b) if a == b => Some(a),
        (DT::Detect, DT::Any) | (DT::Any, DT::Detect) => Some(DT::Detect),
        (DT::Detect | DT::Any, concrete) | (concrete, DT::Detect | DT::Any) => Some(concrete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWITCH: EntityId = EntityId::new(0);
    const LIGHT: EntityId = EntityId::new(1);

    #[test]
    fn incompatible_types_conflict_on_every_number() {
        for number in 0..=u8::MAX {
            let mut registry = Registry::new();
            registry
                .register(number, DatapointType::Bool, SWITCH)
                .unwrap();
            let result = registry.register(number, DatapointType::UInt, LIGHT);
            assert_eq!(
                result,
                Err(DatapointError::Conflict {
                    number,
                    existing: DatapointType::Bool,
                    requested: DatapointType::UInt,
                })
            );
            // The failed registration must not leave the light as an owner.
            assert_eq!(registry.get(number).unwrap().owners(), &[SWITCH]);
        }
    }

    #[test]
    fn agreeing_types_share_a_binding() {
        let mut registry = Registry::new();
        registry.register(1, DatapointType::Bool, SWITCH).unwrap();
        registry.register(1, DatapointType::Bool, LIGHT).unwrap();
        registry.register(1, DatapointType::Bool, LIGHT).unwrap();

        let binding = registry.get(1).unwrap();
        assert_eq!(binding.owners(), &[SWITCH, LIGHT]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concrete_type_replaces_detect() {
        let mut registry = Registry::new();
        registry.register(3, DatapointType::Detect, SWITCH).unwrap();
        registry.register(3, DatapointType::Enum, LIGHT).unwrap();
        assert_eq!(registry.declared_type(3), Some(DatapointType::Enum));

        registry.register(4, DatapointType::Any, SWITCH).unwrap();
        registry.register(4, DatapointType::Detect, LIGHT).unwrap();
        assert_eq!(registry.declared_type(4), Some(DatapointType::Detect));
    }

    #[test]
    fn detect_is_rebound_once() {
        let mut registry = Registry::new();
        registry.register(9, DatapointType::Detect, SWITCH).unwrap();

        assert!(registry.resolve(9, WireType::Enum).is_ok());
        assert_eq!(registry.declared_type(9), Some(DatapointType::Enum));

        // A later message of another type is an anomaly, not a second rebinding.
        assert_eq!(
            registry.resolve(9, WireType::Bool),
            Err(DatapointError::TypeMismatch {
                number: 9,
                expected: DatapointType::Enum,
                observed: WireType::Bool,
            })
        );
        assert!(registry.resolve(9, WireType::Enum).is_ok());
        assert_eq!(registry.declared_type(9), Some(DatapointType::Enum));
    }

    #[test]
    fn any_accepts_without_rebinding() {
        let mut registry = Registry::new();
        registry.register(5, DatapointType::Any, SWITCH).unwrap();
        assert!(registry.resolve(5, WireType::UInt).is_ok());
        assert!(registry.resolve(5, WireType::Bool).is_ok());
        assert_eq!(registry.declared_type(5), Some(DatapointType::Any));
    }

    #[test]
    fn unknown_datapoint() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.resolve(42, WireType::Bool),
            Err(DatapointError::UnknownDatapoint(42))
        );
    }

    #[test]
    fn owner_limit() {
        let mut registry = Registry::new();
        for index in 0..MAX_OWNERS as u16 {
            registry
                .register(7, DatapointType::Bool, EntityId::new(index))
                .unwrap();
        }
        assert_eq!(
            registry.register(7, DatapointType::Bool, EntityId::new(100)),
            Err(DatapointError::TooManyOwners(7))
        );
    }

    #[test]
    fn outbound_type_needs_resolution() {
        let mut registry = Registry::new();
        registry.register(1, DatapointType::Detect, SWITCH).unwrap();
        registry.register(2, DatapointType::Any, SWITCH).unwrap();
        assert_eq!(
            registry.outbound_type(1, WireType::Bool),
            Err(DatapointError::Unresolved(1))
        );
        assert_eq!(registry.outbound_type(2, WireType::UInt), Ok(WireType::UInt));

        registry.resolve(1, WireType::Enum).unwrap();
        assert_eq!(registry.outbound_type(1, WireType::Bool), Ok(WireType::Enum));
    }
}
