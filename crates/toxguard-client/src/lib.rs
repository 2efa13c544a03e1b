//! toxguard Client
//!
//! Calls a running toxguard server from another service, and gates user
//! comments on the result before they are stored.

pub mod client;
pub mod gate;

pub use client::{ModerationClient, DEFAULT_TIMEOUT, MODERATION_URL_ENV};
pub use gate::{CommentGate, Rejection, Verdict, MAX_COMMENT_BYTES};
