//! LLM backend clients and the unified multi-provider invoker.

pub mod deepseek;
pub mod gemini;
pub mod invoker;

pub use deepseek::DeepseekClient;
pub use gemini::{
    GeminiClient, GroundedResponse, GroundingChunk, GroundingMetadata, GroundingSupport,
    TextSegment, WebSource,
};
pub use invoker::{
    AbortCheck, Backend, Invocation, InvokeRequest, LlmInvoker, ProviderError, ProviderInvoker,
};
