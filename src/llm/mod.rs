//! Text generation backends for the narrative report.
//!
//! The report only needs "system prompt + user prompt in, Markdown out",
//! which is what [`TextGenerator`] captures. [`OllamaClient`] is the
//! production implementation.

pub mod client;

pub use client::{LlmConfig, OllamaClient, TextGenerator};
