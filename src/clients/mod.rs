pub mod llm_client;

pub use llm_client::{parse_json_response, strip_json_fences, ChatModel, Embedder, LlmClient};
