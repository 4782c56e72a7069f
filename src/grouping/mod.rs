//! Partitioning of a flat event stream into per-action groups
//!
//! Two disciplines are supported:
//! - start-delimited ([`group_by_start_marker`]): a marker event opens a new
//!   group that runs until the next marker; an optional service rule opens
//!   a trailing pseudo-group for transaction scaffolding
//! - end-delimited with a terminal sentinel
//!   ([`group_by_end_marker_with_terminal`]): the last event must be the
//!   sentinel, and each end marker closes the group it belongs to
//!
//! Grouping is a pure partition: concatenating the groups in order yields
//! the input (minus the terminal sentinel for the end-delimited form).

mod rules;

pub use rules::{ContractMatcher, GroupBoundaryRule, GroupStyle};

use std::collections::HashMap;

use crate::errors::GroupingError;
use crate::types::{DecodedEvent, EventDict};

/// Title of the leading group that precedes the first marker
pub const UNGROUPED_TITLE: &str = "Ungrouped";

/// A contiguous run of events
#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    /// Rule whose marker opened or closed the group, `None` for leading events
    pub rule: Option<GroupBoundaryRule>,
    /// 1-based position among groups of the same title, for numbered rules
    pub number: Option<usize>,
    pub events: EventDict,
}

impl EventGroup {
    /// Header such as `"Vote item #3"`
    pub fn title(&self) -> String {
        let base = self
            .rule
            .as_ref()
            .map(|rule| rule.title.as_str())
            .unwrap_or(UNGROUPED_TITLE);
        match self.number {
            Some(number) => format!("{base} #{number}"),
            None => base.to_string(),
        }
    }

    pub fn is_service(&self) -> bool {
        self.rule.as_ref().is_some_and(|rule| rule.service)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Assigns per-title counters to numbered rules
#[derive(Default)]
struct Numbering {
    counters: HashMap<String, usize>,
}

impl Numbering {
    fn next(&mut self, rule: Option<&GroupBoundaryRule>) -> Option<usize> {
        let rule = rule.filter(|rule| rule.numbered && !rule.service)?;
        let counter = self.counters.entry(rule.title.clone()).or_default();
        *counter += 1;
        Some(*counter)
    }
}

/// Finds the single rule matching an event
fn matching_rule<'r>(
    rules: &'r [GroupBoundaryRule],
    event: &DecodedEvent,
) -> Result<Option<&'r GroupBoundaryRule>, GroupingError> {
    let mut matched = rules.iter().filter(|rule| rule.matches(event));
    let first = matched.next();
    if let (Some(first), Some(second)) = (first, matched.next()) {
        return Err(GroupingError::AmbiguousRule {
            index: event.log_index,
            name: event.name.clone(),
            first: first.describe(),
            second: second.describe(),
        });
    }
    Ok(first)
}

/// Rejects rule sets carrying more than one service rule
fn check_service_rules(rules: &[GroupBoundaryRule]) -> Result<(), GroupingError> {
    let mut service = rules.iter().filter(|rule| rule.service);
    if let (Some(first), Some(second)) = (service.next(), service.next()) {
        return Err(GroupingError::MultipleServiceRules {
            first: first.describe(),
            second: second.describe(),
        });
    }
    Ok(())
}

/// Start-delimited grouping
///
/// Every event matching one of `rules` opens a new group that contains the
/// marker itself and everything up to the next marker. Events before the
/// first marker form an untagged leading group; an empty accumulator is
/// never emitted. With no marker at all the whole stream is one group.
///
/// # Errors
/// - [`GroupingError::MultipleServiceRules`] if more than one rule is a service rule
/// - [`GroupingError::AmbiguousRule`] if two rules match the same event
pub fn group_by_start_marker(
    events: &EventDict,
    rules: &[GroupBoundaryRule],
) -> Result<Vec<EventGroup>, GroupingError> {
    check_service_rules(rules)?;
    let mut groups = Vec::new();
    let mut numbering = Numbering::default();
    let mut current_rule: Option<&GroupBoundaryRule> = None;
    let mut current_number: Option<usize> = None;
    let mut accumulator: Vec<DecodedEvent> = Vec::new();

    for event in events {
        if let Some(rule) = matching_rule(rules, event)? {
            if !accumulator.is_empty() {
                groups.push(EventGroup {
                    rule: current_rule.cloned(),
                    number: current_number,
                    events: EventDict::new(std::mem::take(&mut accumulator)),
                });
            }
            current_rule = Some(rule);
            current_number = numbering.next(Some(rule));
        }
        accumulator.push(event.clone());
    }

    if !accumulator.is_empty() {
        groups.push(EventGroup {
            rule: current_rule.cloned(),
            number: current_number,
            events: EventDict::new(accumulator),
        });
    }

    log::debug!("grouped {} event(s) into {} group(s)", events.len(), groups.len());
    Ok(groups)
}

/// End-delimited grouping with a mandatory terminal sentinel
///
/// The last event must match `terminal_rule`; it is consumed up front and
/// belongs to no group. The remaining events are scanned and each match of
/// `end_rule` closes the current group (marker included).
///
/// # Errors
/// - [`GroupingError::UnexpectedTerminalEvent`] if the stream is empty or its
///   last event does not match `terminal_rule`
/// - [`GroupingError::UnflushedEvents`] if events remain after the last end marker
pub fn group_by_end_marker_with_terminal(
    events: &EventDict,
    end_rule: &GroupBoundaryRule,
    terminal_rule: &GroupBoundaryRule,
) -> Result<Vec<EventGroup>, GroupingError> {
    let Some((terminal, body)) = events.as_slice().split_last() else {
        return Err(GroupingError::UnexpectedTerminalEvent {
            expected: terminal_rule.describe(),
            found: None,
            index: None,
        });
    };
    if !terminal_rule.matches(terminal) {
        return Err(GroupingError::UnexpectedTerminalEvent {
            expected: terminal_rule.describe(),
            found: Some((terminal.address, terminal.name.clone())),
            index: Some(terminal.log_index),
        });
    }

    let mut groups = Vec::new();
    let mut numbering = Numbering::default();
    let mut accumulator: Vec<DecodedEvent> = Vec::new();

    for event in body {
        accumulator.push(event.clone());
        if end_rule.matches(event) {
            groups.push(EventGroup {
                rule: Some(end_rule.clone()),
                number: numbering.next(Some(end_rule)),
                events: EventDict::new(std::mem::take(&mut accumulator)),
            });
        }
    }

    if let Some(first) = accumulator.first() {
        return Err(GroupingError::UnflushedEvents {
            first_index: first.log_index,
            count: accumulator.len(),
        });
    }

    log::debug!(
        "grouped {} event(s) into {} group(s) closed by {}",
        body.len(),
        groups.len(),
        end_rule.describe()
    );
    Ok(groups)
}

/// Checks the group count against the number of proposal actions
pub fn expect_group_count(groups: &[EventGroup], expected: usize) -> Result<(), GroupingError> {
    if groups.len() == expected {
        Ok(())
    } else {
        Err(GroupingError::GroupCount {
            expected,
            actual: groups.len(),
        })
    }
}

/// Flattens groups back into a single stream
pub fn concat_groups(groups: &[EventGroup]) -> EventDict {
    groups
        .iter()
        .flat_map(|group| group.events.iter().cloned())
        .collect()
}
