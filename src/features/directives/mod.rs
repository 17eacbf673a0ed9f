//! # Prompt Directives Feature
//!
//! Inline `--flag` mini-language for overriding generation parameters from
//! the prompt text itself.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod parser;

pub use parser::{parse, DirectiveError, ParsedPrompt, PromptDirectives, Vocabulary};
