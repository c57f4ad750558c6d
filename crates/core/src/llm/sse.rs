use serde::Deserialize;

/// Incremental decoder for OpenAI-style `text/event-stream` chat completions.
///
/// Bytes may arrive split at arbitrary points, including inside a UTF-8 sequence, so
/// only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseTextDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl SseTextDecoder {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(delta) = self.decode_line(&line) {
                out.push(delta);
            }
            if self.done {
                self.buf.clear();
                break;
            }
        }
        out
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<ChunkPayload>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|s| !s.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, "skipping undecodable stream event");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}
