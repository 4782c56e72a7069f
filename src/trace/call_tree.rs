//! Call tree reconstruction from a flat struct-log trace
//!
//! The trace carries no call ids; frames are recovered from the depth and
//! jump-depth sequence alone:
//! - `depth + 1` opens an external frame, closed by the first step at a
//!   lower depth
//! - same depth with `jump_depth + 1` opens an internal frame, closed by a
//!   lower depth or by the same depth with a lower jump depth
//!
//! Gas accounting: `gas_total` is the gas remaining at frame entry minus the
//! gas remaining at its last step plus that step's cost, and `gas_used` is
//! `gas_total` minus the children's totals. So for every frame
//! `gas_total == gas_used + Σ children.gas_total` (saturating).

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{hex, Address, Selector, B256};

use crate::decoder::SignatureTable;
use crate::labels::ContractNameResolver;
use crate::traits::{LabelResolver, NoLabels};
use crate::types::{CallFrame, CallKind, RawTraceStep};
use crate::utils::error_utils::parse_custom_error;

/// Frame about to be opened, as seen by a [`CollapsePredicate`]
#[derive(Debug, Clone, Copy)]
pub struct FrameOpening<'a> {
    /// First step inside the frame
    pub step: &'a RawTraceStep,
    pub kind: CallKind,
    pub label: &'a str,
    pub address: Option<Address>,
}

/// Decides which frames are rendered collapsed
///
/// Collapsed frames keep their children and gas figures; only rendering
/// hides the subtree.
#[derive(Clone, Default)]
pub enum CollapsePredicate {
    /// Expand everything
    #[default]
    Never,
    /// Collapse frames whose label contains any of the patterns
    Patterns(Vec<String>),
    /// Arbitrary decision function
    Custom(Arc<dyn Fn(&FrameOpening<'_>) -> bool + Send + Sync>),
}

impl CollapsePredicate {
    pub fn patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CollapsePredicate::Patterns(patterns.into_iter().map(Into::into).collect())
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&FrameOpening<'_>) -> bool + Send + Sync + 'static,
    {
        CollapsePredicate::Custom(Arc::new(f))
    }

    pub fn should_collapse(&self, opening: &FrameOpening<'_>) -> bool {
        match self {
            CollapsePredicate::Never => false,
            CollapsePredicate::Patterns(patterns) => patterns
                .iter()
                .any(|pattern| opening.label.contains(pattern.as_str())),
            CollapsePredicate::Custom(f) => f(opening),
        }
    }
}

impl fmt::Debug for CollapsePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapsePredicate::Never => write!(f, "Never"),
            CollapsePredicate::Patterns(patterns) => f.debug_tuple("Patterns").field(patterns).finish(),
            CollapsePredicate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Builds a call tree with no labels or signatures
pub fn build_call_tree(steps: &[RawTraceStep], collapse: &CollapsePredicate) -> CallFrame {
    let signatures = SignatureTable::new();
    let labels = ContractNameResolver::new(NoLabels);
    CallTreeBuilder::new(&signatures, &labels)
        .collapse(collapse.clone())
        .build(steps)
}

/// Configurable call tree reconstruction
#[derive(Debug)]
pub struct CallTreeBuilder<'a, R> {
    signatures: &'a SignatureTable,
    labels: &'a ContractNameResolver<R>,
    collapse: CollapsePredicate,
    root_address: Option<Address>,
    root_selector: Option<Selector>,
}

impl<'a, R: LabelResolver> CallTreeBuilder<'a, R> {
    pub fn new(signatures: &'a SignatureTable, labels: &'a ContractNameResolver<R>) -> Self {
        Self {
            signatures,
            labels,
            collapse: CollapsePredicate::Never,
            root_address: None,
            root_selector: None,
        }
    }

    pub fn collapse(mut self, collapse: CollapsePredicate) -> Self {
        self.collapse = collapse;
        self
    }

    /// Sets the top-level contract and, if known, the transaction selector
    pub fn root(mut self, address: Option<Address>, selector: Option<Selector>) -> Self {
        self.root_address = address;
        self.root_selector = selector;
        self
    }

    /// Replays the trace once and returns the root frame
    ///
    /// The root spans the whole trace and is returned even for an empty one.
    pub fn build(&self, steps: &[RawTraceStep]) -> CallFrame {
        let Some(first) = steps.first() else {
            let label = self.external_label(self.root_address, self.root_selector);
            return self.new_frame(label, CallKind::Root, self.root_address, self.root_selector, 0, 0, 0);
        };

        let root_label = self.external_label(self.root_address, self.root_selector);
        let mut root = self.new_frame(
            root_label,
            CallKind::Root,
            self.root_address,
            self.root_selector,
            0,
            first.depth,
            first.jump_depth,
        );
        root.collapsed = self.collapse.should_collapse(&FrameOpening {
            step: first,
            kind: CallKind::Root,
            label: &root.label,
            address: root.address,
        });

        let mut open: Vec<CallFrame> = vec![root];
        let mut internal_counter = 0usize;

        for (i, pair) in steps.windows(2).enumerate() {
            let (prev, step) = (&pair[0], &pair[1]);
            let position = i + 1;

            while open.len() > 1 && open.last().is_some_and(|frame| closes(frame, step)) {
                self.close_top(&mut open, steps, position - 1, Some(step));
            }

            if step.depth > prev.depth {
                let frame = self.open_external(prev, step, position);
                log::trace!("step {position}: open {}", frame.label);
                open.push(frame);
            } else if step.depth == prev.depth && step.jump_depth > prev.jump_depth {
                let parent_address = open.last().and_then(|frame| frame.address);
                for level in prev.jump_depth + 1..=step.jump_depth {
                    internal_counter += 1;
                    let label = format!(
                        "{}.<internal@{:#x}>",
                        self.contract_name(parent_address),
                        step.pc
                    );
                    let mut frame = self.new_frame(
                        label,
                        CallKind::Internal,
                        parent_address,
                        None,
                        position,
                        step.depth,
                        level,
                    );
                    frame.collapsed = self.collapse.should_collapse(&FrameOpening {
                        step,
                        kind: CallKind::Internal,
                        label: &frame.label,
                        address: parent_address,
                    });
                    open.push(frame);
                }
            }
        }

        let last = steps.len() - 1;
        while open.len() > 1 {
            self.close_top(&mut open, steps, last, None);
        }
        let mut root = open.pop().unwrap_or_else(|| {
            self.new_frame(String::new(), CallKind::Root, None, None, 0, first.depth, first.jump_depth)
        });
        finish_frame(&mut root, steps, last);
        log::debug!(
            "rebuilt call tree: {} frame(s), {} internal, {} gas",
            root.frame_count(),
            internal_counter,
            root.gas_total
        );
        root
    }

    fn open_external(&self, opener: &RawTraceStep, step: &RawTraceStep, position: usize) -> CallFrame {
        let kind = CallKind::from_opcode(&opener.op).unwrap_or(CallKind::Call);
        let (address, selector) = call_target(opener, kind);
        let label = if kind.is_create() {
            "<new contract>.constructor".to_string()
        } else {
            self.external_label(address, selector)
        };
        let mut frame = self.new_frame(label, kind, address, selector, position, step.depth, step.jump_depth);
        frame.collapsed = self.collapse.should_collapse(&FrameOpening {
            step,
            kind,
            label: &frame.label,
            address,
        });
        frame
    }

    /// Pops the innermost frame, finalizes it and attaches it to its parent
    fn close_top(
        &self,
        open: &mut Vec<CallFrame>,
        steps: &[RawTraceStep],
        end: usize,
        resumed: Option<&RawTraceStep>,
    ) {
        let Some(mut frame) = open.pop() else { return };
        finish_frame(&mut frame, steps, end);

        if frame.kind.is_create() {
            let created = resumed
                .and_then(|step| step.stack_peek(0))
                .map(|word| Address::from_word(B256::from(word.to_be_bytes::<32>())))
                .filter(|address| !address.is_zero());
            if let Some(created) = created {
                frame.address = Some(created);
                frame.label = format!("{}.constructor", self.contract_name(Some(created)));
            }
        }

        match open.last_mut() {
            Some(parent) => parent.children.push(frame),
            None => open.push(frame),
        }
    }

    fn external_label(&self, address: Option<Address>, selector: Option<Selector>) -> String {
        let function = match selector {
            Some(selector) => self
                .signatures
                .function_name(selector)
                .map(str::to_string)
                .unwrap_or_else(|| hex::encode_prefixed(selector)),
            None => "fallback".to_string(),
        };
        format!("{}.{function}", self.contract_name(address))
    }

    fn contract_name(&self, address: Option<Address>) -> String {
        match address {
            Some(address) => self.labels.display_name(address),
            None => "<unknown>".to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn new_frame(
        &self,
        label: String,
        kind: CallKind,
        address: Option<Address>,
        selector: Option<Selector>,
        start: usize,
        depth: u64,
        jump_depth: u64,
    ) -> CallFrame {
        CallFrame {
            label,
            kind,
            address,
            selector,
            start,
            end: start,
            depth,
            jump_depth,
            gas_used: 0,
            gas_total: 0,
            children: Vec::new(),
            collapsed: false,
            reverted: false,
            revert_reason: None,
        }
    }
}

/// Whether `step` lies outside the innermost open frame
fn closes(frame: &CallFrame, step: &RawTraceStep) -> bool {
    match frame.kind {
        CallKind::Internal => {
            step.depth < frame.depth || (step.depth == frame.depth && step.jump_depth < frame.jump_depth)
        }
        _ => step.depth < frame.depth,
    }
}

/// Records end index, gas figures and revert status
fn finish_frame(frame: &mut CallFrame, steps: &[RawTraceStep], end: usize) {
    frame.end = end.max(frame.start);
    let (Some(first), Some(last)) = (steps.get(frame.start), steps.get(frame.end)) else {
        return;
    };
    frame.gas_total = first
        .gas
        .saturating_sub(last.gas)
        .saturating_add(last.gas_cost);
    let children_total = frame
        .children
        .iter()
        .map(|child| child.gas_total)
        .fold(0u64, u64::saturating_add);
    frame.gas_used = frame.gas_total.saturating_sub(children_total);

    if last.op == "REVERT" && frame.kind != CallKind::Internal {
        frame.reverted = true;
        let output = match (last.stack_usize(0), last.stack_usize(1)) {
            (Some(offset), Some(length)) => last.memory_slice(offset, length),
            _ => None,
        };
        frame.revert_reason = output.and_then(|output| parse_custom_error(&output));
    }
}

/// Code address and calldata selector of a call opcode
fn call_target(opener: &RawTraceStep, kind: CallKind) -> (Option<Address>, Option<Selector>) {
    // stack from the top: gas, address, [value,] argsOffset, argsLength, ...
    let (offset_slot, length_slot) = match kind {
        CallKind::Call | CallKind::CallCode => (3, 4),
        CallKind::DelegateCall | CallKind::StaticCall => (2, 3),
        _ => return (None, None),
    };
    let address = opener
        .stack_peek(1)
        .map(|word| Address::from_word(B256::from(word.to_be_bytes::<32>())));
    let selector = match (opener.stack_usize(offset_slot), opener.stack_usize(length_slot)) {
        (Some(offset), Some(length)) if length >= 4 => opener
            .memory_slice(offset, 4)
            .map(|bytes| Selector::from_slice(&bytes)),
        _ => None,
    };
    (address, selector)
}
