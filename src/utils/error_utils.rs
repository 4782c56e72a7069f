//! Revert payload decoding
//!
//! Reverting frames leave their return data in memory. This module turns
//! that payload into a readable reason:
//! - `Error(string)`: the revert message itself
//! - `Panic(uint256)`: a description of the Solidity panic code
//!
//! Custom errors and bare reverts are left to the caller, which shows the
//! raw payload instead.

use alloy::dyn_abi::{DynSolType, DynSolValue};

/// Selector of `Error(string)`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Solidity panic codes and their meaning
const PANIC_CODES: &[(u64, &str)] = &[
    (0x00, "generic compiler panic"),
    (0x01, "assertion failed"),
    (0x11, "arithmetic overflow or underflow"),
    (0x12, "division or modulo by zero"),
    (0x21, "invalid enum value"),
    (0x22, "corrupted storage byte array"),
    (0x31, "pop on empty array"),
    (0x32, "array index out of bounds"),
    (0x41, "out of memory"),
    (0x51, "call to zero-initialized function"),
];

/// Decodes a revert payload into a message
///
/// # Returns
/// * `Some(String)` - The revert string, or `Panic: <description>`
/// * `None` - Empty payload, custom error, or undecodable data
pub fn parse_custom_error(output: &[u8]) -> Option<String> {
    if output.len() < 4 {
        return None;
    }
    let (selector, payload) = output.split_at(4);

    if selector == ERROR_STRING_SELECTOR {
        return match DynSolType::String.abi_decode(payload) {
            Ok(DynSolValue::String(reason)) => Some(reason),
            _ => None,
        };
    }

    if selector == PANIC_SELECTOR {
        let Ok(DynSolValue::Uint(code, _)) = DynSolType::Uint(256).abi_decode(payload) else {
            return None;
        };
        let description = match u64::try_from(code) {
            Ok(code) => PANIC_CODES
                .iter()
                .find(|(known, _)| *known == code)
                .map(|(_, description)| description.to_string())
                .unwrap_or_else(|| format!("unknown code {code:#x}")),
            Err(_) => format!("unknown code {code}"),
        };
        return Some(format!("Panic: {description}"));
    }

    None
}
