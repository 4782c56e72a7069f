//! Event decoding from receipts and raw traces
//!
//! Two best-effort paths produce the same ordered [`EventDict`]:
//! - [`decode_receipt_logs`]: the receipt's flat log list, preferred
//!   whenever the transaction did not revert
//! - [`decode_trace`]: a normalized struct-log trace, replayed to attribute
//!   every LOG instruction to the contract whose context emitted it
//!
//! Logs whose topic-0 is unknown, or whose payload fails to decode, become
//! placeholder events named [`UNDECODED_EVENT_NAME`](crate::types::UNDECODED_EVENT_NAME)
//! with raw topics and data kept. Nothing is ever dropped.

mod signatures;

pub use signatures::{MatchedEvent, SignatureTable};

use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::Log;

use crate::errors::MalformedTraceError;
use crate::labels::ContractNameResolver;
use crate::traits::LabelResolver;
use crate::types::{CallKind, DecodedEvent, EventDict, RawTraceStep, WORD_SIZE};

/// Decodes a single log
pub fn decode_event<R: LabelResolver>(
    log_index: usize,
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    signatures: &SignatureTable,
    labels: &ContractNameResolver<R>,
) -> DecodedEvent {
    let mut event = match signatures.decode_log(&topics, &data) {
        Some(matched) => DecodedEvent {
            log_index,
            address,
            label: String::new(),
            name: matched.name,
            fields: matched.fields,
            topics,
            data,
        },
        None => {
            log::debug!(
                "log {log_index} from {address} left undecoded (topic0 {:?})",
                topics.first()
            );
            DecodedEvent::undecoded(log_index, address, topics, data)
        }
    };
    event.label = labels.resolve(address);
    event
}

/// Decodes the logs of a transaction receipt
pub fn decode_receipt_logs<R: LabelResolver>(
    logs: &[Log],
    signatures: &SignatureTable,
    labels: &ContractNameResolver<R>,
) -> EventDict {
    logs.iter()
        .enumerate()
        .map(|(index, log)| {
            decode_event(
                index,
                log.inner.address,
                log.inner.data.topics().to_vec(),
                log.inner.data.data.clone(),
                signatures,
                labels,
            )
        })
        .collect()
}

/// Log context of one open external call frame
#[derive(Debug)]
struct FrameContext {
    depth: u64,
    kind: CallKind,
    /// `None` while a contract is being created
    address: Option<Address>,
    /// Events emitted while `address` was unknown
    pending: Vec<usize>,
}

/// A LOG instruction lifted out of the trace
struct RawLog {
    address: Option<Address>,
    topics: Vec<B256>,
    data: Bytes,
}

/// Decodes every LOG instruction of a normalized trace
///
/// `initial_address` is the contract executing at the top level (the
/// transaction recipient, or `None` for a creation transaction). Events are
/// attributed to the storage context of the frame that emitted them, so
/// delegate calls report the proxy, not the implementation.
///
/// # Errors
/// Returns [`MalformedTraceError`] if a LOG step lacks its stack operands or
/// its data region is not in the recorded memory.
pub fn decode_trace<R: LabelResolver>(
    steps: &[RawTraceStep],
    initial_address: Option<Address>,
    signatures: &SignatureTable,
    labels: &ContractNameResolver<R>,
) -> Result<EventDict, MalformedTraceError> {
    let events = collect_trace_logs(steps, initial_address)?
        .into_iter()
        .enumerate()
        .map(|(index, log)| {
            decode_event(
                index,
                log.address.unwrap_or(Address::ZERO),
                log.topics,
                log.data,
                signatures,
                labels,
            )
        })
        .collect::<Vec<_>>();

    log::debug!("decoded {} event(s) from {} trace step(s)", events.len(), steps.len());
    Ok(EventDict::new(events))
}

fn collect_trace_logs(
    steps: &[RawTraceStep],
    initial_address: Option<Address>,
) -> Result<Vec<RawLog>, MalformedTraceError> {
    let mut logs: Vec<RawLog> = Vec::new();
    let Some(first) = steps.first() else {
        return Ok(logs);
    };

    let mut frames = vec![FrameContext {
        depth: first.depth,
        kind: CallKind::Root,
        address: initial_address,
        pending: Vec::new(),
    }];

    for (position, step) in steps.iter().enumerate() {
        let current_depth = frames.last().map(|frame| frame.depth).unwrap_or(step.depth);

        if step.depth > current_depth {
            let opener = position.checked_sub(1).map(|i| &steps[i]);
            frames.push(enter_frame(opener, step, &frames));
        }

        while frames.len() > 1 && frames.last().is_some_and(|frame| frame.depth > step.depth) {
            if let Some(frame) = frames.pop() {
                exit_frame(frame, step, &mut frames, &mut logs);
            }
        }

        if let Some(topic_count) = step.log_topic_count() {
            let mut address = step.address;
            if let Some(frame) = frames.last_mut() {
                address = address.or(frame.address);
                if address.is_none() {
                    frame.pending.push(logs.len());
                }
            }
            logs.push(read_log(step, topic_count, address)?);
        }
    }

    Ok(logs)
}

fn enter_frame(
    opener: Option<&RawTraceStep>,
    step: &RawTraceStep,
    frames: &[FrameContext],
) -> FrameContext {
    let parent_address = frames.last().and_then(|frame| frame.address);
    let kind = opener
        .and_then(|op| CallKind::from_opcode(&op.op))
        .unwrap_or(CallKind::Call);
    let address = match kind {
        CallKind::Create | CallKind::Create2 => None,
        kind if kind.keeps_context() => parent_address,
        _ => opener
            .and_then(|op| op.stack_peek(1))
            .map(|word| Address::from_word(B256::from(word.to_be_bytes::<32>()))),
    };
    log::trace!("step {}: entering {kind:?} frame at depth {} ({address:?})", step.index, step.depth);
    FrameContext {
        depth: step.depth,
        kind,
        address,
        pending: Vec::new(),
    }
}

fn exit_frame(
    frame: FrameContext,
    resumed: &RawTraceStep,
    frames: &mut [FrameContext],
    logs: &mut [RawLog],
) {
    if frame.pending.is_empty() {
        return;
    }
    if frame.kind.is_create() {
        // CREATE pushes the new address (or zero on failure) onto the parent's stack
        let created = resumed
            .stack_peek(0)
            .map(|word| Address::from_word(B256::from(word.to_be_bytes::<32>())))
            .filter(|address| !address.is_zero());
        if let Some(created) = created {
            for &index in &frame.pending {
                logs[index].address = Some(created);
            }
            return;
        }
    }
    if let Some(parent) = frames.last_mut() {
        parent.pending.extend(frame.pending);
    }
}

fn read_log(
    step: &RawTraceStep,
    topic_count: usize,
    address: Option<Address>,
) -> Result<RawLog, MalformedTraceError> {
    let required = 2 + topic_count;
    if step.stack.len() < required {
        return Err(MalformedTraceError::new(
            step.index,
            step.op.clone(),
            format!("stack has {} item(s), needs {required}", step.stack.len()),
        ));
    }

    let topics = (0..topic_count)
        .filter_map(|n| step.stack_peek(2 + n))
        .map(|word| B256::from(word.to_be_bytes::<32>()))
        .collect::<Vec<_>>();

    let offset = step.stack_usize(0).unwrap_or(usize::MAX);
    let length = step.stack_usize(1).unwrap_or(usize::MAX);
    let data = step.memory_slice(offset, length).ok_or_else(|| {
        MalformedTraceError::new(
            step.index,
            step.op.clone(),
            format!(
                "log data region {offset}+{length} not in recorded memory ({} bytes)",
                step.memory.len() * WORD_SIZE
            ),
        )
    })?;

    Ok(RawLog {
        address,
        topics,
        data: data.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::AddressBook;
    use crate::types::UNDECODED_EVENT_NAME;
    use alloy::primitives::{address, keccak256, LogData, U256};

    const VOTING: Address = address!("2e59a20f205bb85a89c53f1936454680651e618e");
    const PROXY: Address = address!("ae7ab96520de3a18e5e111b5eaab095312d7fe84");
    const IMPL: Address = address!("17144556fd3424edc8fc8a4c940b2d04936d17eb");

    fn resolver() -> ContractNameResolver<AddressBook> {
        ContractNameResolver::new(AddressBook::new().with(VOTING, "Voting").with(PROXY, "Lido"))
    }

    fn rpc_log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(topics, data.into()),
            },
            ..Default::default()
        }
    }

    fn step(index: usize, depth: u64, op: &str, stack: Vec<U256>) -> RawTraceStep {
        RawTraceStep {
            index,
            depth,
            op: op.to_string(),
            gas: 1_000_000 - index as u64 * 10,
            gas_cost: 3,
            stack,
            ..Default::default()
        }
    }

    // LOG2 with empty data, stack bottom to top: topic1, topic0, length, offset
    fn execute_vote_log_step(index: usize, depth: u64) -> RawTraceStep {
        step(
            index,
            depth,
            "LOG2",
            vec![
                U256::from(7u64),
                U256::from_be_bytes(keccak256("ExecuteVote(uint256)").0),
                U256::ZERO,
                U256::ZERO,
            ],
        )
    }

    #[test]
    fn test_receipt_unknown_topic_kept() {
        let unknown = B256::repeat_byte(0xab);
        let logs = vec![
            rpc_log(VOTING, vec![keccak256("ExecuteVote(uint256)"), B256::with_last_byte(1)], vec![]),
            rpc_log(PROXY, vec![unknown], vec![1, 2, 3]),
        ];
        let events = decode_receipt_logs(&logs, &SignatureTable::with_governance_defaults(), &resolver());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "ExecuteVote");
        assert_eq!(events[0].label, "Voting");
        assert_eq!(events[1].name, UNDECODED_EVENT_NAME);
        assert_eq!(events[1].address, PROXY);
        assert_eq!(events[1].topics, vec![unknown]);
        assert_eq!(events[1].data, Bytes::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_receipt_anonymous_log_kept() {
        let logs = vec![rpc_log(VOTING, vec![], vec![0xff])];
        let events = decode_receipt_logs(&logs, &SignatureTable::new(), &resolver());
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_decoded());
    }

    #[test]
    fn test_trace_attributes_to_call_target() {
        let steps = vec![
            step(0, 1, "PUSH1", vec![]),
            // CALL: gas, to, value, argsOffset, argsLength, retOffset, retLength (top first)
            step(
                1,
                1,
                "CALL",
                vec![
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::from_be_bytes(PROXY.into_word().0),
                    U256::from(50_000u64),
                ],
            ),
            execute_vote_log_step(2, 2),
            step(3, 2, "STOP", vec![]),
            step(4, 1, "POP", vec![U256::from(1u64)]),
            execute_vote_log_step(5, 1),
        ];
        let events = decode_trace(
            &steps,
            Some(VOTING),
            &SignatureTable::with_governance_defaults(),
            &resolver(),
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].address, PROXY);
        assert_eq!(events[0].label, "Lido");
        assert_eq!(events[0].name, "ExecuteVote");
        assert_eq!(events[1].address, VOTING);
    }

    #[test]
    fn test_trace_delegatecall_keeps_proxy_context() {
        let steps = vec![
            // DELEGATECALL: gas, to, argsOffset, argsLength, retOffset, retLength (top first)
            step(
                0,
                1,
                "DELEGATECALL",
                vec![
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::ZERO,
                    U256::from_be_bytes(IMPL.into_word().0),
                    U256::from(50_000u64),
                ],
            ),
            execute_vote_log_step(1, 2),
            step(2, 1, "POP", vec![U256::from(1u64)]),
        ];
        let events = decode_trace(&steps, Some(PROXY), &SignatureTable::new(), &resolver()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].address, PROXY);
    }

    #[test]
    fn test_trace_create_patched_after_return() {
        let created = address!("0000000000000000000000000000000000c0ffee");
        let steps = vec![
            step(0, 1, "CREATE", vec![U256::ZERO, U256::ZERO, U256::ZERO]),
            execute_vote_log_step(1, 2),
            step(2, 2, "RETURN", vec![]),
            step(3, 1, "SWAP1", vec![U256::from_be_bytes(created.into_word().0)]),
        ];
        let events = decode_trace(&steps, Some(VOTING), &SignatureTable::new(), &resolver()).unwrap();
        assert_eq!(events[0].address, created);
    }

    #[test]
    fn test_trace_log_with_short_stack_is_malformed() {
        let steps = vec![step(0, 1, "LOG1", vec![U256::ZERO, U256::ZERO])];
        let err = decode_trace(&steps, Some(VOTING), &SignatureTable::new(), &resolver()).unwrap_err();
        assert_eq!(err.step, 0);
    }

    #[test]
    fn test_trace_log_outside_memory_is_malformed() {
        let steps = vec![
            step(0, 1, "PUSH1", vec![]),
            step(
                1,
                1,
                "LOG1",
                vec![
                    U256::from_be_bytes(keccak256("ExecuteVote(uint256)").0),
                    U256::from(64u64),
                    U256::ZERO,
                ],
            ),
        ];
        let err = decode_trace(
            &steps,
            Some(VOTING),
            &SignatureTable::with_governance_defaults(),
            &resolver(),
        )
        .unwrap_err();
        assert_eq!(err.step, 1);
        assert_eq!(err.op, "LOG1");
    }
}
