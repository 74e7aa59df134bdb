//! LLM: upstream provider adapter for the chat relay.
//!
//! DESIGN
//! ======
//! Uses environment variables instead of config files. Only one provider is
//! wired (Gemini `generateContent`); callers depend on the [`TextGenerator`]
//! trait, never on the concrete client.

pub mod config;
pub mod gemini;
pub mod types;

pub use gemini::GeminiClient;
pub use types::{GenerationOptions, LlmError, TextGenerator};
