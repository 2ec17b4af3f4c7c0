//! Byte-chunk to event decoder.
//!
//! Transports hand over bytes in whatever chunks the network or pipe yields.
//! [`LineDecoder`] buffers them, splits on `\n`, and returns the payload of
//! every complete line that matches the configured prefix convention. The
//! buffer holds raw bytes, so a multi-byte UTF-8 sequence split across two
//! chunks is decoded exactly as if it had arrived whole.

use serde::de::DeserializeOwned;

/// Which lines of a stream carry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePrefix {
    /// Server-sent events: only `data:` lines, `[DONE]` ignored.
    Sse,
    /// One JSON document per line (CLI backends).
    JsonLines,
}

/// Stateful splitter for one transport. Never shared between runs.
#[derive(Debug)]
pub struct LineDecoder {
    prefix: LinePrefix,
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new(prefix: LinePrefix) -> Self {
        Self {
            prefix,
            buffer: Vec::new(),
        }
    }

    pub fn sse() -> Self {
        Self::new(LinePrefix::Sse)
    }

    pub fn json_lines() -> Self {
        Self::new(LinePrefix::JsonLines)
    }

    /// Feed a chunk and collect the payloads of all lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(payload) = self.extract(&line) {
                payloads.push(payload.to_string());
            }
        }
        payloads
    }

    /// Feed a chunk and decode every completed line as `T`.
    ///
    /// Lines that are not valid `T` are dropped.
    pub fn decode<T: DeserializeOwned>(&mut self, chunk: &[u8]) -> Vec<T> {
        self.push(chunk)
            .into_iter()
            .filter_map(|payload| match serde_json::from_str::<T>(&payload) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::trace!(error = %err, "dropping undecodable stream line");
                    None
                }
            })
            .collect()
    }

    /// Bytes received after the last newline.
    pub fn unconsumed(&self) -> &[u8] {
        &self.buffer
    }

    /// End of stream. Whatever partial line is left is discarded and returned
    /// for diagnostics.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        rest
    }

    fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match self.prefix {
            LinePrefix::Sse => {
                let data = line.strip_prefix("data:")?.trim_start();
                if data.is_empty() || data == "[DONE]" {
                    return None;
                }
                Some(data)
            }
            LinePrefix::JsonLines => Some(line),
        }
    }
}
