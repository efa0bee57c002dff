//! Mapping between runtime types and stable contract tags.

use std::any::TypeId;
use std::collections::HashMap;

use thiserror::Error;

/// Errors raised while building a contract map.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractMapError {
    /// The contract tag is already bound to another type.
    #[error("Contract {0:?} is already registered")]
    DuplicateContract(String),

    /// The type is already bound to another contract tag.
    #[error("Type {0} is already registered")]
    DuplicateType(&'static str),
}

/// Bidirectional map from runtime payload types to stable string contract
/// tags, used for polymorphic (de)serialization of snapshots and events.
///
/// Built once at startup; registering the same type or tag twice is a
/// configuration error.
#[derive(Debug, Default)]
pub struct ContractMap {
    by_type: HashMap<TypeId, &'static str>,
    by_contract: HashMap<&'static str, TypeId>,
}

impl ContractMap {
    /// Creates an empty contract map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a type to a contract tag.
    pub fn register<T: 'static>(&mut self, contract: &'static str) -> Result<(), ContractMapError> {
        let type_id = TypeId::of::<T>();
        if self.by_contract.contains_key(contract) {
            return Err(ContractMapError::DuplicateContract(contract.to_string()));
        }
        if self.by_type.contains_key(&type_id) {
            return Err(ContractMapError::DuplicateType(std::any::type_name::<T>()));
        }
        self.by_type.insert(type_id, contract);
        self.by_contract.insert(contract, type_id);
        Ok(())
    }

    /// Returns the contract tag registered for a type, if any.
    pub fn contract_of<T: 'static>(&self) -> Option<&'static str> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the type registered under a contract tag, if any.
    pub fn type_of(&self, contract: &str) -> Option<TypeId> {
        self.by_contract.get(contract).copied()
    }

    /// Returns the number of registered contracts.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Returns true when no contracts are registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
