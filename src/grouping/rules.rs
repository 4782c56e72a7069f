//! Group boundary rules
//!
//! A rule names a `(contract, event)` pair that structurally marks a group
//! boundary, plus how the resulting group is titled and styled. Rules are
//! stateless and can be reused across transactions.

use alloy::primitives::Address;
use colored::Color;

use crate::types::DecodedEvent;

/// Which emitter a rule accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractMatcher {
    /// Any emitting contract
    Any,
    /// A specific deployed address
    Address(Address),
    /// Any contract whose resolved label equals this one
    Label(String),
}

impl ContractMatcher {
    pub fn matches(&self, event: &DecodedEvent) -> bool {
        match self {
            ContractMatcher::Any => true,
            ContractMatcher::Address(address) => event.address == *address,
            ContractMatcher::Label(label) => event.label == *label,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ContractMatcher::Any => "*".to_string(),
            ContractMatcher::Address(address) => address.to_string(),
            ContractMatcher::Label(label) => label.clone(),
        }
    }
}

impl From<Address> for ContractMatcher {
    fn from(address: Address) -> Self {
        ContractMatcher::Address(address)
    }
}

impl From<&str> for ContractMatcher {
    fn from(label: &str) -> Self {
        ContractMatcher::Label(label.to_string())
    }
}

/// Presentation hints for a group header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStyle {
    pub color: Option<Color>,
    pub bold: bool,
}

impl GroupStyle {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// A boundary pattern: events matching it open (or close) a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBoundaryRule {
    pub contract: ContractMatcher,
    pub event_name: String,
    /// Group header, e.g. `"Vote item"`
    pub title: String,
    /// Append `#n` to the title, counting per title
    pub numbered: bool,
    pub style: GroupStyle,
    /// Marks whole-transaction scaffolding rather than a proposal action
    pub service: bool,
}

impl GroupBoundaryRule {
    pub fn new(
        contract: impl Into<ContractMatcher>,
        event_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            event_name: event_name.into(),
            title: title.into(),
            numbered: false,
            style: GroupStyle::default(),
            service: false,
        }
    }

    pub fn numbered(mut self) -> Self {
        self.numbered = true;
        self
    }

    pub fn style(mut self, style: GroupStyle) -> Self {
        self.style = style;
        self
    }

    /// Turns the rule into the trailing service-group rule
    pub fn service(mut self) -> Self {
        self.service = true;
        self.numbered = false;
        self
    }

    pub fn matches(&self, event: &DecodedEvent) -> bool {
        event.name == self.event_name && self.contract.matches(event)
    }

    /// `Contract:Event` description used in error messages
    pub fn describe(&self) -> String {
        format!("{}:{}", self.contract.describe(), self.event_name)
    }
}
