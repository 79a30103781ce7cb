//! Generation collaborator for Scrivener.
//!
//! The core only ever sees the [`Generator`] trait. [`GroqClient`] is the
//! production implementation speaking the OpenAI-compatible chat completions
//! protocol; tests plug in scripted generators.
//!
//! Generation comes in two shapes: [`Generator::generate`] returns the whole
//! reply, [`Generator::generate_stream`] yields it in chunks as they arrive.

pub mod groq;
pub mod prompt;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scrivener_types::models::{ContentType, Length, Role, Tone};

pub use groq::GroqClient;

/// One turn of conversation context handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub content_type: ContentType,
    pub tone: Tone,
    pub length: Length,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("provider request timed out")]
    Timeout,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider rejected credentials")]
    AuthRejected,

    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Transient failures are worth retrying with the same context; the rest
    /// need reconfiguration first.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Timeout | ProviderError::Unavailable(_)
        )
    }
}

/// Reply text in arrival order. Concatenated, the chunks form the reply.
pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

/// Produces text for an ordered conversation context.
///
/// Uses native async fn in traits; see [`BoxGenerator`] for dynamic dispatch.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        context: &[ContextMessage],
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Incremental variant of [`Generator::generate`]. Without an override
    /// the whole reply arrives as a single chunk.
    fn generate_stream<'a>(&'a self, context: &'a [ContextMessage], options: &'a GenerationOptions) -> ChunkStream<'a> {
        Box::pin(futures_util::stream::once(self.generate(context, options)))
    }
}

/// Object-safe mirror of [`Generator`] with boxed futures.
pub trait GeneratorDyn: Send + Sync {
    fn generate_boxed<'a>(
        &'a self,
        context: &'a [ContextMessage],
        options: &'a GenerationOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;

    fn generate_stream_boxed<'a>(
        &'a self,
        context: &'a [ContextMessage],
        options: &'a GenerationOptions,
    ) -> ChunkStream<'a>;
}

impl<T: Generator> GeneratorDyn for T {
    fn generate_boxed<'a>(
        &'a self,
        context: &'a [ContextMessage],
        options: &'a GenerationOptions,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(self.generate(context, options))
    }

    fn generate_stream_boxed<'a>(
        &'a self,
        context: &'a [ContextMessage],
        options: &'a GenerationOptions,
    ) -> ChunkStream<'a> {
        self.generate_stream(context, options)
    }
}

/// Type-erased generator, so the HTTP state does not have to be generic
/// over the provider.
pub struct BoxGenerator {
    inner: Box<dyn GeneratorDyn>,
}

impl BoxGenerator {
    pub fn new<T: Generator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }
}

impl Generator for BoxGenerator {
    fn generate(
        &self,
        context: &[ContextMessage],
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        async move { self.inner.generate_boxed(context, options).await }
    }

    fn generate_stream<'a>(&'a self, context: &'a [ContextMessage], options: &'a GenerationOptions) -> ChunkStream<'a> {
        self.inner.generate_stream_boxed(context, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{StreamExt, TryStreamExt};

    struct Echo;

    impl Generator for Echo {
        async fn generate(
            &self,
            context: &[ContextMessage],
            options: &GenerationOptions,
        ) -> Result<String, ProviderError> {
            let last = context.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("{}:{}", options.model, last))
        }
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            content_type: ContentType::BlogPost,
            tone: Tone::Casual,
            length: Length::Short,
            model: "m".into(),
        }
    }

    #[tokio::test]
    async fn boxed_generator_delegates() {
        let boxed = BoxGenerator::new(Echo);
        let context = vec![ContextMessage { role: Role::User, content: "hi".into() }];
        let out = boxed.generate(&context, &options()).await.unwrap();
        assert_eq!(out, "m:hi");
    }

    /// Streams the prompt back one word at a time.
    struct Words;

    impl Generator for Words {
        async fn generate(&self, _: &[ContextMessage], _: &GenerationOptions) -> Result<String, ProviderError> {
            Err(ProviderError::InvalidResponse("stream only".into()))
        }

        fn generate_stream<'a>(&'a self, context: &'a [ContextMessage], _: &'a GenerationOptions) -> ChunkStream<'a> {
            let words: Vec<Result<String, ProviderError>> = context
                .iter()
                .flat_map(|m| m.content.split_inclusive(' ').map(|w| Ok(w.to_string())))
                .collect();
            Box::pin(futures_util::stream::iter(words))
        }
    }

    #[tokio::test]
    async fn default_stream_is_the_whole_reply() {
        let context = vec![ContextMessage { role: Role::User, content: "hi".into() }];
        let options = options();
        let chunks: Vec<String> = Echo.generate_stream(&context, &options).try_collect().await.unwrap();
        assert_eq!(chunks, vec!["m:hi"]);
    }

    #[tokio::test]
    async fn boxed_generator_keeps_the_override() {
        let boxed = BoxGenerator::new(Words);
        let context = vec![ContextMessage { role: Role::User, content: "one two three".into() }];
        let options = options();
        let chunks: Vec<String> = boxed
            .generate_stream(&context, &options)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["one ", "two ", "three"]);
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: Some(3) }.is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Unavailable("502".into()).is_transient());
        assert!(!ProviderError::AuthRejected.is_transient());
        assert!(!ProviderError::Rejected { status: 404, message: "no model".into() }.is_transient());
        assert!(!ProviderError::InvalidResponse("bad json".into()).is_transient());
    }
}
