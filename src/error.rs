//! Grepable error codes shared by every service error type.
//!
//! DESIGN
//! ======
//! Each module owns its own `thiserror` enum. Routes never match on those
//! enums' message text; they read the stable code and the retryable flag
//! through this trait and render them into the JSON error body.

/// Stable machine-readable classification for an error.
pub trait ErrorCode {
    /// Grepable code, e.g. `E_UPSTREAM`.
    fn error_code(&self) -> &'static str;

    /// Whether the same request could succeed if sent again unchanged.
    fn retryable(&self) -> bool {
        false
    }
}
