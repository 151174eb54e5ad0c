use anyhow::Result;
use async_trait::async_trait;

/// A generative-language model: prompt in, raw completion text out.
#[async_trait]
pub trait ModelClient {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
