use std::fmt;

/// Non-success reply from the Stripe REST API.
#[derive(Debug, Clone)]
pub struct StripeApiError {
    pub status: u16,
    pub message: String,
    pub code: Option<String>,
}

impl fmt::Display for StripeApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StripeApiError {}
