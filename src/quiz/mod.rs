//! Quiz questions and where they come from
//!
//! - `source`: the remote question source contract
//! - `bank`: a built-in curated question set
//! - `procedural`: offline generator used whenever the source fails
//! - `session`: per-run question lifecycle

pub mod bank;
pub mod procedural;
pub mod session;
pub mod source;

use std::fmt;

use serde::{Deserialize, Serialize};

use source::QuestionPayload;

/// A validated multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    /// Semantic difficulty, multiplies the points for a correct answer
    pub difficulty_level: u32,
    pub explanation: Option<String>,
}

/// Why a question payload was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    EmptyPrompt,
    OptionCount { expected: usize, found: usize },
    CorrectIndexOutOfRange { index: i64, len: usize },
    EmptyOption(usize),
}

impl fmt::Display for QuestionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionError::EmptyPrompt => write!(f, "question prompt is empty"),
            QuestionError::OptionCount { expected, found } => {
                write!(f, "expected {expected} options, found {found}")
            }
            QuestionError::CorrectIndexOutOfRange { index, len } => {
                write!(f, "correct index {index} out of range for {len} options")
            }
            QuestionError::EmptyOption(i) => write!(f, "option {i} is empty"),
        }
    }
}

impl std::error::Error for QuestionError {}

impl Question {
    /// Validate a source payload against the number of enemies to spawn
    pub fn from_payload(payload: QuestionPayload, expected_options: usize) -> Result<Self, QuestionError> {
        let prompt = payload.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if payload.options.len() != expected_options {
            return Err(QuestionError::OptionCount {
                expected: expected_options,
                found: payload.options.len(),
            });
        }
        if let Some(i) = payload.options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption(i));
        }
        let correct_index = match payload.correct_index {
            Some(i) if i >= 0 && (i as usize) < payload.options.len() => i as usize,
            Some(i) => {
                return Err(QuestionError::CorrectIndexOutOfRange {
                    index: i,
                    len: payload.options.len(),
                });
            }
            None => {
                return Err(QuestionError::CorrectIndexOutOfRange {
                    index: -1,
                    len: payload.options.len(),
                });
            }
        };

        Ok(Self {
            prompt,
            options: payload.options,
            correct_index,
            difficulty_level: payload.difficulty_level.unwrap_or(1).max(1),
            explanation: payload.explanation.filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}
