//! Backend implementations for external analysis services.

pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
