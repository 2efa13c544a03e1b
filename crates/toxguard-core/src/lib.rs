//! toxguard Core
//!
//! Types shared across toxguard components:
//! - Error types and result handling
//! - The JSON request and response exchanged with the `/moderate` endpoint

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ModerationRequest, ModerationResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ModerationRequest, ModerationResult};
}
