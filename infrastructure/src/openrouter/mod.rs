//! OpenRouter gateway adapter
//!
//! Implements the [`LlmGateway`](concilium_application::LlmGateway) port
//! against the OpenRouter chat-completions API, including SSE streaming and
//! the cached model catalog.

pub mod gateway;
pub mod sse;
pub mod wire;
