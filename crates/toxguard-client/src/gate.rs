//! Comment admission
//!
//! Validates a comment and runs it through moderation before it is stored.

use std::fmt;
use toxguard_core::{Error, ModerationResult, Result};

use crate::client::ModerationClient;

/// Longest comment accepted, in bytes of UTF-8
pub const MAX_COMMENT_BYTES: usize = 1000;

/// Labels must score above this to be reported in a rejection
const FLAG_SCORE: f64 = 0.5;

/// Outcome of reviewing a comment
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved(ModerationResult),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved(_))
    }
}

/// Why a comment was turned down
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub toxicity_score: f64,
    /// Toxic labels above 0.5, highest first
    pub flagged: Vec<(String, f64)>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let categories = self
            .flagged
            .iter()
            .map(|(label, score)| format!("{} ({:.0}%)", label, score * 100.0))
            .collect::<Vec<_>>()
            .join(", ");

        write!(
            f,
            "Your comment was rejected by moderation. Overall toxicity: {:.0}%. \
             Problem categories: {}. Please rephrase your comment.",
            self.toxicity_score * 100.0,
            categories
        )
    }
}

/// Gate applied to user comments
#[derive(Debug, Clone)]
pub struct CommentGate {
    client: ModerationClient,
    safe_label: String,
}

impl CommentGate {
    pub fn new(client: ModerationClient) -> Self {
        Self {
            client,
            safe_label: "non-toxic".to_string(),
        }
    }

    /// Label excluded from the flagged categories
    pub fn with_safe_label(mut self, label: impl Into<String>) -> Self {
        self.safe_label = label.into();
        self
    }

    /// Validate and moderate a comment
    pub async fn review(&self, content: &str) -> Result<Verdict> {
        if content.is_empty() {
            return Err(Error::invalid_input("comment content cannot be empty"));
        }
        if content.len() > MAX_COMMENT_BYTES {
            return Err(Error::invalid_input("comment is too long"));
        }

        let result = self.client.moderate(content).await.map_err(|e| {
            tracing::error!("Moderation failed: {}", e);
            match e {
                Error::ModerationUnavailable(_) => e,
                other => Error::moderation_unavailable(other.to_string()),
            }
        })?;

        if result.is_approved {
            return Ok(Verdict::Approved(result));
        }

        let rejection = Rejection {
            toxicity_score: result.toxicity_score,
            flagged: result.flagged_labels(&self.safe_label, FLAG_SCORE),
        };
        tracing::info!("Comment rejected: {:?}", rejection.flagged);

        Ok(Verdict::Rejected(rejection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> CommentGate {
        CommentGate::new(ModerationClient::new(None).unwrap())
    }

    #[tokio::test]
    async fn test_empty_comment() {
        let err = gate().review("").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid input: comment content cannot be empty");
    }

    #[tokio::test]
    async fn test_length_is_counted_in_bytes() {
        // 500 Cyrillic letters are exactly 1000 bytes
        assert!(gate().review(&"я".repeat(500)).await.unwrap().is_approved());

        let err = gate().review(&"я".repeat(501)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejection_message() {
        let rejection = Rejection {
            toxicity_score: 0.923,
            flagged: vec![
                ("obscenity".to_string(), 0.881),
                ("insult".to_string(), 0.714),
            ],
        };

        assert_eq!(
            rejection.to_string(),
            "Your comment was rejected by moderation. Overall toxicity: 92%. \
             Problem categories: obscenity (88%), insult (71%). Please rephrase your comment."
        );
    }
}
