use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmError {
    pub stage: &'static str,
    pub status: Option<u16>,
    pub detail: String,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "chat completion error (stage={}, status={status}): {}",
                self.stage, self.detail
            ),
            None => write!(f, "chat completion error (stage={}): {}", self.stage, self.detail),
        }
    }
}

impl std::error::Error for LlmError {}
