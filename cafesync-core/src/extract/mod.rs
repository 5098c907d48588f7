//! Store-info extraction: asks a generative model for the café name and
//! address mentioned in a post caption.

pub mod llm;
pub mod prompt;
pub mod traits;

pub use llm::LlmStoreExtractor;
pub use prompt::{ParsedExtraction, build_prompt, parse_model_response};
pub use traits::StoreExtractor;
