//! Splitting raw process output into lines

/// Incremental line splitter for raw process output
///
/// Both `\n` and `\r` terminate a line, so progress bars that redraw with a
/// carriage return produce one line per redraw. Empty lines are dropped and
/// invalid UTF-8 is replaced lossily. Bytes are buffered until a terminator,
/// so multi-byte characters split across reads decode correctly.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Create an empty splitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line it completed
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.take_line() {
                    lines.push(line);
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush a trailing line that had no terminator
    pub fn finish(&mut self) -> Option<String> {
        self.take_line()
    }

    fn take_line(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        (!line.trim().is_empty()).then_some(line)
    }
}
