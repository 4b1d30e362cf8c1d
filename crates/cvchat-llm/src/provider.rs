use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Turns text into a vector for similarity search.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, rejects the request,
    /// or does not support embeddings.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts, returning vectors in input order.
    ///
    /// The default issues one `embed` call per text; backends with a native
    /// batch endpoint override it.
    ///
    /// # Errors
    ///
    /// Returns the first embedding error encountered.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Answer `prompt` as the next user turn after `history`.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`LlmProvider::chat`].
    fn complete(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        async move {
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.extend_from_slice(history);
            messages.push(Message::user(prompt));
            self.chat(&messages).await
        }
    }

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingProvider {
        seen: Mutex<Vec<Message>>,
    }

    impl LlmProvider for RecordingProvider {
        async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok("ok".into())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct LengthEmbedder;

    impl EmbeddingProvider for LengthEmbedder {
        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![text.len() as f32])
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn message_constructors_set_role() {
        assert_eq!(Message::user("q").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::system("s").content, "s");
    }

    #[tokio::test]
    async fn complete_appends_prompt_after_history() {
        let provider = RecordingProvider {
            seen: Mutex::new(Vec::new()),
        };
        let history = vec![Message::user("first"), Message::assistant("reply")];

        let answer = provider.complete("second", &history).await.unwrap();
        assert_eq!(answer, "ok");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Message::user("first"));
        assert_eq!(seen[2], Message::user("second"));
    }

    #[tokio::test]
    async fn default_embed_batch_preserves_order() {
        let texts = vec!["a".to_owned(), "abc".to_owned(), "ab".to_owned()];
        let vectors = LengthEmbedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn default_embed_batch_empty_input() {
        let vectors = LengthEmbedder.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
