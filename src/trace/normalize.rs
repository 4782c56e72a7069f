//! LOG data length alignment
//!
//! Some nodes report the data length of a LOG instruction as a value that
//! is not a multiple of 32 even though the ABI-encoded payload occupies a
//! padded, word-aligned region. Reading the reported length truncates the
//! last ABI word, so every LOG step is rounded up before decoding.

use alloy::primitives::{B256, U256};

use crate::errors::MalformedTraceError;
use crate::types::{RawTraceStep, WORD_SIZE};

/// Aligns LOG data lengths in place
///
/// Only the `stack` and `memory` of LOG steps are touched. Running this
/// twice is a no-op the second time.
///
/// # Errors
/// Returns [`MalformedTraceError`] naming the step when a LOG step does not
/// carry the offset, length and topic operands on its stack, or when its
/// non-empty data region is not covered by the recorded memory.
pub fn normalize(steps: &mut [RawTraceStep]) -> Result<(), MalformedTraceError> {
    for step in steps.iter_mut() {
        if let Some(topics) = step.log_topic_count() {
            align_log_step(step, topics)?;
        }
    }
    Ok(())
}

/// Owned variant of [`normalize`]
pub fn normalized(mut steps: Vec<RawTraceStep>) -> Result<Vec<RawTraceStep>, MalformedTraceError> {
    normalize(&mut steps)?;
    Ok(steps)
}

fn align_log_step(step: &mut RawTraceStep, topics: usize) -> Result<(), MalformedTraceError> {
    let required = 2 + topics;
    if step.stack.len() < required {
        return Err(MalformedTraceError::new(
            step.index,
            step.op.clone(),
            format!("stack has {} item(s), LOG{topics} needs {required}", step.stack.len()),
        ));
    }

    let offset = step
        .stack_usize(0)
        .ok_or_else(|| MalformedTraceError::new(step.index, step.op.clone(), "log offset out of range"))?;
    let length = step
        .stack_usize(1)
        .ok_or_else(|| MalformedTraceError::new(step.index, step.op.clone(), "log length out of range"))?;

    let reported_end = offset.checked_add(length).ok_or_else(|| {
        MalformedTraceError::new(step.index, step.op.clone(), "log region overflows")
    })?;
    if length > 0 && reported_end > step.memory.len() * WORD_SIZE {
        return Err(MalformedTraceError::new(
            step.index,
            step.op.clone(),
            format!(
                "log data region {offset}+{length} not in recorded memory ({} bytes)",
                step.memory.len() * WORD_SIZE
            ),
        ));
    }

    let remainder = length % WORD_SIZE;
    if remainder == 0 {
        return Ok(());
    }

    let aligned = length + (WORD_SIZE - remainder);
    let length_slot = step.stack.len() - 2;
    step.stack[length_slot] = U256::from(aligned);

    // only the padding past the reported end may be missing, at most one word
    let words_needed = (offset + aligned).div_ceil(WORD_SIZE);
    if step.memory.len() < words_needed {
        log::trace!(
            "step {}: padding memory from {} to {} words for aligned log",
            step.index,
            step.memory.len(),
            words_needed
        );
        step.memory.resize(words_needed, B256::ZERO);
    }
    Ok(())
}
