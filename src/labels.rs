//! Contract name resolution for display
//!
//! Wraps an injected [`LabelResolver`] so that lookups never fail: an
//! unknown address resolves to the empty string and callers fall back to
//! showing the raw address.

use std::collections::HashMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::traits::LabelResolver;

/// Address-to-label table, typically loaded from the network configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook {
    entries: HashMap<Address, String>,
}

impl AddressBook {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses a JSON object of `"0x…": "Label"` entries
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, address: Address, label: impl Into<String>) -> &mut Self {
        self.entries.insert(address, label.into());
        self
    }

    pub fn with(mut self, address: Address, label: impl Into<String>) -> Self {
        self.insert(address, label);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LabelResolver for AddressBook {
    fn resolve_label(&self, address: Address) -> Option<String> {
        self.entries.get(&address).cloned()
    }
}

impl FromIterator<(Address, String)> for AddressBook {
    fn from_iter<T: IntoIterator<Item = (Address, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Infallible label lookup over any registry
#[derive(Debug, Clone, Copy)]
pub struct ContractNameResolver<R> {
    registry: R,
}

impl<R: LabelResolver> ContractNameResolver<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Label of `address`, or `""` if the registry does not know it
    pub fn resolve(&self, address: Address) -> String {
        self.registry.resolve_label(address).unwrap_or_default()
    }

    /// Label of `address`, or the checksummed address itself
    pub fn display_name(&self, address: Address) -> String {
        self.registry
            .resolve_label(address)
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }
}
