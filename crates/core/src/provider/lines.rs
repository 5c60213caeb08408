//! Line framing for streamed HTTP bodies (SSE and NDJSON).

/// Accumulates body chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `bytes` and returns every line completed by them, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode(&line[..line.len() - 1]));
        }
        lines
    }

    /// Whatever is left after the body ends, if non-blank.
    pub fn finish(&mut self) -> Option<String> {
        let rest = decode(&std::mem::take(&mut self.pending));
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(&text).to_string()
}
