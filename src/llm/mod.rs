//! Translation client boundary: prompt in, raw model text out.

pub mod client;
pub mod retry;

pub use client::LlmClient;
pub use retry::{RetryPolicy, RetryingTranslator};

use crate::error::Result;
use async_trait::async_trait;

/// Anything that turns a prompt into generated text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, prompt: &str) -> Result<String>;
}
