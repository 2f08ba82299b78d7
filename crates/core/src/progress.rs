// crates/core/src/progress.rs
//! Line-based progress protocol for external tools.
//!
//! Tools are treated as byte-stream producers. Output is cut into lines at
//! `\n` or `\r` (progress bars redraw in place with carriage returns), and
//! the first `<number>%` on a line is taken as the completion percentage.
//! Lines without a percentage are not an error; callers log them and move on.

use std::sync::OnceLock;

use regex_lite::Regex;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("valid percent regex"))
}

/// Extract the first percentage on `line` as an integer in `0..=100`.
///
/// Fractions are truncated: `"12.9%"` yields `12`.
pub fn parse_percent(line: &str) -> Option<u8> {
    let caps = percent_re().captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

/// Longest unterminated line kept while waiting for its terminator. Older
/// bytes of a longer line are discarded.
pub const MAX_PENDING_LINE: usize = 8 * 1024;

/// Incremental splitter turning arbitrary byte chunks into text lines.
///
/// Empty lines (e.g. the gap in `\r\n`) are dropped. Invalid UTF-8 is
/// replaced rather than rejected. An unterminated line is held to its last
/// [`MAX_PENDING_LINE`] bytes.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = memchr::memchr2(b'\n', b'\r', rest) {
            self.pending.extend_from_slice(&rest[..pos]);
            if let Some(line) = self.take_pending() {
                lines.push(line);
            }
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        if self.pending.len() > MAX_PENDING_LINE {
            let excess = self.pending.len() - MAX_PENDING_LINE;
            self.pending.drain(..excess);
        }
        lines
    }

    /// Flush a trailing line that was not terminated.
    pub fn finish(&mut self) -> Option<String> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!line.is_empty()).then_some(line)
    }
}
