//! Status line rendering.
//!
//! Placeholders, lowercase for the bare count and uppercase for the count
//! followed by a label:
//!
//! | placeholder | count |
//! |------|-------|
//! | `%t` `%T` | total (`task(s) total`) |
//! | `%w` `%W` | waiting |
//! | `%r` `%R` | running |
//! | `%p` `%P` | paused |
//! | `%d` `%D` | done |
//! | `%c` `%C` | cancelled |
//! | `%f` `%F` | failed |
//! | `%a` `%A` | active (waiting + paused + running) |
//!
//! Unknown sequences are dropped.

use crate::task::types::TaskCounts;
use std::fmt::Write;

/// Default status line format
pub const DEFAULT_STATUS_FORMAT: &str = "%A (%W, %R, %P) %F";

/// Render the status line; `None` when nothing is left to show
pub fn render_status_line(format: &str, counts: &TaskCounts) -> Option<String> {
    let mut line = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            line.push(c);
            continue;
        }
        let Some(placeholder) = chars.next() else {
            break;
        };
        let (count, label) = match placeholder.to_ascii_lowercase() {
            't' => (counts.total, "task(s) total"),
            'w' => (counts.waiting, "waiting"),
            'r' => (counts.running, "running"),
            'p' => (counts.paused, "paused"),
            'd' => (counts.done, "done"),
            'c' => (counts.cancelled, "cancelled"),
            'f' => (counts.failed, "failed"),
            'a' => (counts.active(), "active"),
            _ => continue,
        };
        // Writing to a String cannot fail
        let _ = if placeholder.is_ascii_uppercase() {
            write!(line, "{} {}", count, label)
        } else {
            write!(line, "{}", count)
        };
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
