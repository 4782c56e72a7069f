//! Integration tests for event grouping
//!
//! # Test Coverage
//! - Start-delimited grouping of an Aragon vote script
//! - End-delimited grouping closed by a terminal sentinel
//! - Order preservation and group counts over arbitrary event streams

mod common;

use alloy::primitives::Address;
use common::{event, ACL, AGENT, FINANCE, VOTING};
use gov_trace::grouping::{
    concat_groups, expect_group_count, group_by_end_marker_with_terminal, group_by_start_marker,
    ContractMatcher, GroupBoundaryRule,
};
use gov_trace::{DecodedEvent, EventDict, GroupingError};
use proptest::prelude::*;

const CONTRACTS: [(Address, &str); 3] = [(VOTING, "Voting"), (AGENT, "Agent"), (FINANCE, "Finance")];
const NAMES: [&str; 4] = ["LogScriptCall", "Transfer", "VaultTransfer", "ItemExecuted"];

fn stream(layout: &[(usize, usize)]) -> EventDict {
    layout.iter()
        .enumerate()
        .map(|(i, (contract, name))| {
            let (address, label) = CONTRACTS[*contract];
            event(i, address, label, NAMES[*name])
        })
        .collect()
}

fn arb_stream() -> impl Strategy<Value = EventDict> {
    prop::collection::vec((0..CONTRACTS.len(), 0..NAMES.len()), 0..40).prop_map(|layout| stream(&layout))
}

fn script_call_rule() -> GroupBoundaryRule {
    GroupBoundaryRule::new(VOTING, "LogScriptCall", "Vote item").numbered()
}

#[test]
fn test_vote_script_groups() {
    common::init_logger();
    let events: EventDict = vec![
        event(0, VOTING, "Voting", "LogScriptCall"),
        event(1, VOTING, "Voting", "Transfer"),
        event(2, AGENT, "Agent", "VaultTransfer"),
        event(3, VOTING, "Voting", "LogScriptCall"),
        event(4, ACL, "ACL", "RoleGranted"),
    ]
    .into();

    let groups = group_by_start_marker(&events, &[script_call_rule()]).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].title(), "Vote item #1");
    assert_eq!(groups[0].events.names(), vec!["LogScriptCall", "Transfer", "VaultTransfer"]);
    assert_eq!(groups[1].title(), "Vote item #2");
    assert_eq!(groups[1].events.names(), vec!["LogScriptCall", "RoleGranted"]);
    expect_group_count(&groups, 2).unwrap();
    assert_eq!(concat_groups(&groups), events);
}

#[test]
fn test_service_group_trails_vote_items() {
    let events: EventDict = vec![
        event(0, VOTING, "Voting", "LogScriptCall"),
        event(1, AGENT, "Agent", "VaultTransfer"),
        event(2, VOTING, "Voting", "ExecuteVote"),
    ]
    .into();
    let rules = [
        script_call_rule(),
        GroupBoundaryRule::new(VOTING, "ExecuteVote", "Vote execution").service(),
    ];

    let groups = group_by_start_marker(&events, &rules).unwrap();

    assert_eq!(groups.len(), 2);
    assert!(!groups[0].is_service());
    assert!(groups[1].is_service());
    assert_eq!(groups[1].title(), "Vote execution");
    assert!(matches!(
        expect_group_count(&groups, 3),
        Err(GroupingError::GroupCount { expected: 3, actual: 2 })
    ));
}

#[test]
fn test_leading_events_form_ungrouped_group() {
    let events = stream(&[(1, 1), (0, 0), (2, 2)]);
    let groups = group_by_start_marker(&events, &[script_call_rule()]).unwrap();

    assert_eq!(groups.len(), 2);
    assert!(groups[0].rule.is_none());
    assert_eq!(groups[0].title(), "Ungrouped");
    assert_eq!(groups[1].title(), "Vote item #1");
}

#[test]
fn test_dual_governance_items() {
    let end = GroupBoundaryRule::new(ContractMatcher::Any, "ItemExecuted", "Proposal call").numbered();
    let terminal = GroupBoundaryRule::new(ContractMatcher::Any, "ProposalExecuted", "Proposal");

    let mut events = stream(&[(1, 1), (1, 3), (2, 2), (2, 3)]).into_vec();
    events.push(event(4, FINANCE, "Finance", "ProposalExecuted"));
    let events = EventDict::new(events);

    let groups = group_by_end_marker_with_terminal(&events, &end, &terminal).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].title(), "Proposal call #2");
    assert_eq!(concat_groups(&groups).len(), 4);
    assert!(concat_groups(&groups).iter().all(|e| e.name != "ProposalExecuted"));
}

#[test]
fn test_missing_terminal_is_reported() {
    let end = GroupBoundaryRule::new(ContractMatcher::Any, "ItemExecuted", "Proposal call");
    let terminal = GroupBoundaryRule::new(ContractMatcher::Any, "ProposalExecuted", "Proposal");

    let err = group_by_end_marker_with_terminal(&EventDict::default(), &end, &terminal).unwrap_err();
    assert!(matches!(err, GroupingError::UnexpectedTerminalEvent { found: None, .. }));

    let events = stream(&[(1, 3), (1, 1)]);
    let err = group_by_end_marker_with_terminal(&events, &end, &terminal).unwrap_err();
    match err {
        GroupingError::UnexpectedTerminalEvent { found, index, .. } => {
            assert_eq!(found, Some((AGENT, "Transfer".to_string())));
            assert_eq!(index, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_events_after_last_end_marker_are_unflushed() {
    let end = GroupBoundaryRule::new(ContractMatcher::Any, "ItemExecuted", "Proposal call");
    let terminal = GroupBoundaryRule::new(ContractMatcher::Any, "ProposalExecuted", "Proposal");
    let mut events = stream(&[(1, 3), (1, 1), (2, 2)]).into_vec();
    events.push(event(3, FINANCE, "Finance", "ProposalExecuted"));

    let err = group_by_end_marker_with_terminal(&EventDict::new(events), &end, &terminal).unwrap_err();
    assert!(matches!(err, GroupingError::UnflushedEvents { first_index: 1, count: 2 }));
}

fn is_marker(event: &DecodedEvent) -> bool {
    event.address == VOTING && event.name == "LogScriptCall"
}

proptest! {
    #[test]
    fn prop_start_grouping_preserves_order(events in arb_stream()) {
        let groups = group_by_start_marker(&events, &[script_call_rule()]).unwrap();
        prop_assert_eq!(concat_groups(&groups), events);
        prop_assert!(groups.iter().all(|group| !group.is_empty()));
    }

    #[test]
    fn prop_start_grouping_count(events in arb_stream()) {
        let groups = group_by_start_marker(&events, &[script_call_rule()]).unwrap();
        let markers = events.iter().filter(|e| is_marker(e)).count();
        let leading = events.first().is_some_and(|first| !is_marker(first));
        prop_assert_eq!(groups.len(), markers + usize::from(leading));
        for group in groups.iter().filter(|group| group.rule.is_some()) {
            prop_assert!(is_marker(&group.events[0]));
        }
    }

    #[test]
    fn prop_zero_markers_single_group(events in arb_stream()) {
        let rule = GroupBoundaryRule::new(VOTING, "NeverEmitted", "Vote item");
        let groups = group_by_start_marker(&events, &[rule]).unwrap();
        if events.is_empty() {
            prop_assert!(groups.is_empty());
        } else {
            prop_assert_eq!(groups.len(), 1);
            prop_assert_eq!(&groups[0].events, &events);
        }
    }

    #[test]
    fn prop_terminal_enforced(events in arb_stream().prop_filter("non-empty", |e| !e.is_empty())) {
        let end = GroupBoundaryRule::new(ContractMatcher::Any, "ItemExecuted", "Proposal call");
        let terminal = GroupBoundaryRule::new(ContractMatcher::Any, "ProposalExecuted", "Proposal");
        let result = group_by_end_marker_with_terminal(&events, &end, &terminal);
        let is_unexpected_terminal = matches!(result, Err(GroupingError::UnexpectedTerminalEvent { .. }));
        prop_assert!(is_unexpected_terminal);
    }

    #[test]
    fn prop_end_grouping_partitions_body(events in arb_stream()) {
        let end = GroupBoundaryRule::new(ContractMatcher::Any, "ItemExecuted", "Proposal call");
        let terminal = GroupBoundaryRule::new(ContractMatcher::Any, "ProposalExecuted", "Proposal");

        // close any trailing run so the body is fully flushed
        let mut body = events.into_vec();
        if body.last().is_some_and(|last| last.name != "ItemExecuted") {
            body.push(event(body.len(), AGENT, "Agent", "ItemExecuted"));
        }
        let mut with_terminal = body.clone();
        with_terminal.push(event(body.len(), FINANCE, "Finance", "ProposalExecuted"));

        let groups = group_by_end_marker_with_terminal(&EventDict::new(with_terminal), &end, &terminal).unwrap();
        let ends = body.iter().filter(|e| e.name == "ItemExecuted").count();
        prop_assert_eq!(groups.len(), ends);
        prop_assert_eq!(concat_groups(&groups), EventDict::new(body));
    }
}
