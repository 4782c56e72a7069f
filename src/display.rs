//! Indented tree rendering of grouped events and call trees
//!
//! Rendering is a pure function of its inputs. Colour and emphasis come
//! from each group's [`GroupStyle`](crate::grouping::GroupStyle) and are
//! applied only when [`RenderOptions::colors`] is set.

use std::fmt::Write;

use colored::Colorize;

use crate::grouping::{EventGroup, GroupStyle};
use crate::types::{CallFrame, DecodedEvent, DynSolValue};

const PIPE: &str = "│  ";
const EDGE: &str = "└─ ";
const BRANCH: &str = "├─ ";
const SPACE: &str = "   ";

/// Rendering switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit ANSI colours and emphasis
    pub colors: bool,
    /// Print decoded event fields under each event
    pub fields: bool,
    /// Print gas figures next to call frames
    pub gas: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            colors: false,
            fields: true,
            gas: true,
        }
    }
}

impl RenderOptions {
    pub fn colored(mut self, yes: bool) -> Self {
        self.colors = yes;
        self
    }

    pub fn with_fields(mut self, yes: bool) -> Self {
        self.fields = yes;
        self
    }

    pub fn with_gas(mut self, yes: bool) -> Self {
        self.gas = yes;
        self
    }
}

fn styled(text: &str, style: &GroupStyle, options: &RenderOptions) -> String {
    if !options.colors {
        return text.to_string();
    }
    let mut out = text.normal();
    if let Some(color) = style.color {
        out = out.color(color);
    }
    if style.bold {
        out = out.bold();
    }
    out.to_string()
}

/// Short, single-line rendering of a decoded value
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", alloy::primitives::hex::encode(&word[..*size])),
        DynSolValue::Bytes(bytes) => format!("0x{}", alloy::primitives::hex::encode(bytes)),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            format!("[{}]", items.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        DynSolValue::Tuple(items) => {
            format!("({})", items.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        other => format!("{other:?}"),
    }
}

fn write_event(out: &mut String, prefix: &str, last: bool, event: &DecodedEvent, options: &RenderOptions) {
    let connector = if last { EDGE } else { BRANCH };
    let name = if options.colors {
        event.name.cyan().to_string()
    } else {
        event.name.clone()
    };
    let _ = writeln!(out, "{prefix}{connector}{}: {name}", event.emitter());

    let child_prefix = format!("{prefix}{}", if last { SPACE } else { PIPE });
    if event.is_decoded() {
        if options.fields {
            for (i, (field, value)) in event.fields.iter().enumerate() {
                let connector = if i + 1 == event.fields.len() { EDGE } else { BRANCH };
                let _ = writeln!(out, "{child_prefix}{connector}{field}: {}", format_value(value));
            }
        }
    } else {
        let topics = event
            .topics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{child_prefix}{BRANCH}topics: [{topics}]");
        let _ = writeln!(out, "{child_prefix}{EDGE}data: {}", event.data);
    }
}

/// Renders groups as a tree, one header per group
pub fn render_groups(groups: &[EventGroup], options: &RenderOptions) -> String {
    let mut out = String::new();
    for group in groups {
        let style = group.rule.as_ref().map(|rule| rule.style).unwrap_or_default();
        let header = format!("{} ({} event{})", group.title(), group.len(), if group.len() == 1 { "" } else { "s" });
        let _ = writeln!(out, "{}", styled(&header, &style, options));
        for (i, event) in group.events.iter().enumerate() {
            write_event(&mut out, "", i + 1 == group.len(), event, options);
        }
    }
    out
}

fn write_frame(out: &mut String, prefix: &str, connector: &str, frame: &CallFrame, options: &RenderOptions) {
    let mut line = frame.display_label();
    if options.gas {
        let _ = write!(line, "  [{} / {} gas]", frame.gas_used, frame.gas_total);
    }
    if frame.reverted {
        let reason = frame.revert_reason.as_deref().unwrap_or("");
        let marker = format!("  REVERT {reason}").trim_end().to_string();
        if options.colors {
            line.push_str(&marker.red().to_string());
        } else {
            line.push_str(&marker);
        }
    }
    let _ = writeln!(out, "{prefix}{connector}{line}");

    if frame.collapsed {
        return;
    }
    let child_prefix = match connector {
        "" => String::new(),
        EDGE => format!("{prefix}{SPACE}"),
        _ => format!("{prefix}{PIPE}"),
    };
    for (i, child) in frame.children.iter().enumerate() {
        let connector = if i + 1 == frame.children.len() { EDGE } else { BRANCH };
        write_frame(out, &child_prefix, connector, child, options);
    }
}

/// Renders a call tree; collapsed frames hide their children
pub fn render_call_tree(root: &CallFrame, options: &RenderOptions) -> String {
    let mut out = String::new();
    write_frame(&mut out, "", "", root, options);
    out
}
