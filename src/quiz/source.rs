//! Remote question source contract
//!
//! The engine never performs I/O itself. It emits a [`QuestionRequest`]; the
//! host calls a [`QuestionSource`] and hands the result back tagged with the
//! request's ticket.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP status the source uses for its quota / payment gate
pub const PAYMENT_REQUIRED: u16 = 402;

/// Request body sent to the question source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub topic: String,
    /// 0 (easy) ..= 3 (hardest)
    pub difficulty_tier: u8,
    pub question_index: u32,
    /// Prompts already shown this run, to discourage repeats
    pub previous_prompts: Vec<String>,
}

/// Response body from the question source (not yet validated)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[serde(alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, alias = "correct_option_index", alias = "correct_index")]
    pub correct_index: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default, alias = "difficulty_level")]
    pub difficulty_level: Option<u32>,
}

/// Question source failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transport failure (connection refused, timeout, ...)
    Network(String),
    /// Non-2xx status other than the payment gate
    Status(u16),
    /// Quota exhausted; the run must stop
    PaymentRequired,
    /// Response could not be used as a question
    Malformed(String),
}

impl SourceError {
    pub fn from_status(status: u16) -> Self {
        if status == PAYMENT_REQUIRED {
            SourceError::PaymentRequired
        } else {
            SourceError::Status(status)
        }
    }

    /// Fatal for the run rather than recovered by fallback
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, SourceError::PaymentRequired)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Network(msg) => write!(f, "network error: {msg}"),
            SourceError::Status(code) => write!(f, "question source returned HTTP {code}"),
            SourceError::PaymentRequired => write!(f, "question quota exhausted (HTTP 402)"),
            SourceError::Malformed(msg) => write!(f, "malformed question: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Interpret a raw HTTP response from the question service
pub fn parse_response(status: u16, body: &str) -> Result<QuestionPayload, SourceError> {
    if !(200..300).contains(&status) {
        return Err(SourceError::from_status(status));
    }
    serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Anything that can answer a question request
pub trait QuestionSource {
    fn fetch(&mut self, request: &QuestionRequest) -> Result<QuestionPayload, SourceError>;
}

impl<F> QuestionSource for F
where
    F: FnMut(&QuestionRequest) -> Result<QuestionPayload, SourceError>,
{
    fn fetch(&mut self, request: &QuestionRequest) -> Result<QuestionPayload, SourceError> {
        self(request)
    }
}

/// A source that is never reachable; every question comes from the fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl QuestionSource for Unavailable {
    fn fetch(&mut self, _request: &QuestionRequest) -> Result<QuestionPayload, SourceError> {
        Err(SourceError::Network("question source offline".to_string()))
    }
}
