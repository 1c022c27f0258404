//! Concrete LLM provider implementations.

mod ollama;
mod openai;

pub use ollama::{DEFAULT_OLLAMA_URL, OllamaProvider};
pub use openai::OpenAiProvider;
