//! Byte-stream line assembly for the host link.

use heapless::String;

/// Maximum accepted command line length; longer lines are dropped.
pub const COMMAND_SIZE: usize = 128;

/// Assembles host bytes into complete command lines.
///
/// Carriage returns count as newlines; other control characters are
/// discarded. `;` and `(` open comments and `)` closes one; comment bytes
/// never reach the buffer. Everything is upcased on the way in, which is
/// also the form the checksum runs over. A line that overflows the buffer
/// is silently discarded — the host will time out and retry.
#[derive(Debug, Default)]
pub struct LineReader {
    buffer: String<COMMAND_SIZE>,
    comment: bool,
    discarding: bool,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte from the host. Returns a completed line on newline —
    /// possibly empty for a comment-only line, which still gets its "ok".
    pub fn feed(&mut self, byte: u8) -> Option<String<COMMAND_SIZE>> {
        let c = if byte == b'\r' { b'\n' } else { byte };

        // Throw away control chars except newline.
        if c < b' ' && c != b'\n' {
            return None;
        }

        if c != b'\n' {
            if self.discarding {
                return None;
            }
            if c == b';' || c == b'(' {
                self.comment = true;
            }
            if !self.comment {
                if self.buffer.push(c.to_ascii_uppercase() as char).is_err() {
                    self.discarding = true;
                    self.buffer.clear();
                }
            } else if c == b')' {
                self.comment = false;
            }
            return None;
        }

        // Newline: a line counts if it carried content or an open comment.
        let had_content = !self.buffer.is_empty() || self.comment;
        let overflowed = self.discarding;
        let line = core::mem::take(&mut self.buffer);
        self.comment = false;
        self.discarding = false;

        if overflowed || !had_content {
            None
        } else {
            Some(line)
        }
    }
}
