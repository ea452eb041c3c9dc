//! Concrete LLM provider adapters.

pub mod ollama;

pub use ollama::OllamaClient;
