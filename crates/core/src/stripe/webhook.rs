use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde::Deserialize;
use std::fmt;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SCHEME: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    EmptySecret,
    MalformedHeader(String),
    NoSignatures,
    SignatureMismatch,
    TimestampOutsideTolerance { age_secs: i64 },
    InvalidPayload(String),
    Crypto(String),
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "webhook signing secret is not configured"),
            Self::MalformedHeader(detail) => write!(f, "malformed signature header: {detail}"),
            Self::NoSignatures => write!(f, "no {SCHEME} signatures found in header"),
            Self::SignatureMismatch => {
                write!(f, "no signatures found matching the expected signature for payload")
            }
            Self::TimestampOutsideTolerance { age_secs } => {
                write!(f, "timestamp outside the tolerance zone (age={age_secs}s)")
            }
            Self::InvalidPayload(detail) => write!(f, "webhook payload is not a valid event: {detail}"),
            Self::Crypto(detail) => write!(f, "signature computation failed: {detail}"),
        }
    }
}

impl std::error::Error for WebhookError {}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    CheckoutSessionCompleted,
    Other(String),
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookEventKind {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => WebhookEventKind::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentIntentFailed,
            "checkout.session.completed" => WebhookEventKind::CheckoutSessionCompleted,
            other => WebhookEventKind::Other(other.to_string()),
        }
    }

    /// `data.object.id`, i.e. the payment intent or checkout session id.
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }
}

#[derive(Debug)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            // First timestamp wins.
            "t" if timestamp.is_none() => {
                let t = value
                    .parse::<i64>()
                    .ok()
                    .filter(|t| *t >= 0)
                    .ok_or_else(|| WebhookError::MalformedHeader(format!("bad timestamp {value:?}")))?;
                timestamp = Some(t);
            }
            SCHEME => {
                // Undecodable entries can never match; skip them like unknown schemes.
                if let Some(sig) = decode_hex(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(WebhookError::NoSignatures);
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> Result<Vec<u8>, WebhookError> {
    let crypto = |e: openssl::error::ErrorStack| WebhookError::Crypto(e.to_string());

    let key = PKey::hmac(secret.as_bytes()).map_err(crypto)?;
    let mut signer = Signer::new(MessageDigest::sha256(), &key).map_err(crypto)?;
    signer.update(timestamp.to_string().as_bytes()).map_err(crypto)?;
    signer.update(b".").map_err(crypto)?;
    signer.update(payload).map_err(crypto)?;
    signer.sign_to_vec().map_err(crypto)
}

/// Verifies `signature_header` against `payload` and decodes the event.
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<WebhookEvent, WebhookError> {
    construct_event_with_tolerance(payload, signature_header, secret, now, DEFAULT_TOLERANCE_SECS)
}

pub fn construct_event_with_tolerance(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<WebhookEvent, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::EmptySecret);
    }

    let header = parse_header(signature_header)?;
    let expected = compute_signature(payload, secret, header.timestamp)?;

    let matched = header
        .signatures
        .iter()
        .any(|sig| sig.len() == expected.len() && openssl::memcmp::eq(sig, &expected));
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    let age_secs = now.timestamp().saturating_sub(header.timestamp);
    if tolerance_secs > 0 && age_secs > tolerance_secs {
        return Err(WebhookError::TimestampOutsideTolerance { age_secs });
    }

    serde_json::from_slice::<WebhookEvent>(payload)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

/// Builds a header value that [`construct_event`] accepts.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::EmptySecret);
    }
    let sig = compute_signature(payload, secret, timestamp)?;
    Ok(format!("t={timestamp},{SCHEME}={}", encode_hex(&sig)))
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
