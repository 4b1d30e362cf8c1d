use cvchat_llm::{EmbeddingProvider, LlmError, LlmProvider, Message};
use cvchat_memory::document::{
    DocumentError, IngestionPipeline, TextExtractor, TextSplitter, UploadedDocument,
};
use cvchat_memory::{IndexError, VectorIndex};

use crate::config::Config;
use crate::prompt;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no documents have been processed yet")]
    NotReady,

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("failed to embed question: {0}")]
    Embedding(#[source] LlmError),

    #[error("failed to generate answer: {0}")]
    Generation(#[source] LlmError),
}

/// Retrieval and history behaviour of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub top_k: usize,
    pub condense_question: bool,
    pub reset_history_on_process: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            condense_question: true,
            reset_history_on_process: true,
        }
    }
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            condense_question: config.retrieval.condense_question,
            reset_history_on_process: config.session.reset_history_on_process,
        }
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Ready {
        index: VectorIndex,
        history: Vec<Message>,
    },
}

/// One user's conversation over a set of processed documents.
///
/// Starts idle; [`Session::process`] builds the index and makes it ready for
/// [`Session::ask`]. Both take `&mut self`, so a session runs one operation at a time.
#[derive(Debug)]
pub struct Session<E, L> {
    embedder: E,
    llm: L,
    pipeline: IngestionPipeline,
    settings: SessionSettings,
    state: State,
}

impl<E: EmbeddingProvider, L: LlmProvider> Session<E, L> {
    #[must_use]
    pub fn new(embedder: E, llm: L, pipeline: IngestionPipeline, settings: SessionSettings) -> Self {
        Self {
            embedder,
            llm,
            pipeline,
            settings,
            state: State::Idle,
        }
    }

    /// Session with the default PDF reader and the configured splitter and retrieval settings.
    #[must_use]
    pub fn from_config(embedder: E, llm: L, config: &Config) -> Self {
        let pipeline = IngestionPipeline::new(
            TextExtractor::default(),
            TextSplitter::new(config.document.splitter_config()),
        );
        Self::new(embedder, llm, pipeline, SessionSettings::from_config(config))
    }

    /// Extract, chunk and index `documents`, replacing any previous index.
    ///
    /// Returns the number of indexed chunks. On failure the previous index and
    /// history are kept as they were.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be parsed or embedding fails.
    pub async fn process(&mut self, documents: Vec<UploadedDocument>) -> Result<usize, SessionError> {
        let count = documents.len();
        let chunks = self.pipeline.chunk_documents(documents).await?;
        if chunks.is_empty() {
            tracing::warn!(documents = count, "no text extracted from documents");
        }
        let index = VectorIndex::build(chunks, &self.embedder).await?;
        let chunk_count = index.len();

        let history = match std::mem::replace(&mut self.state, State::Idle) {
            State::Ready { history, .. } if !self.settings.reset_history_on_process => history,
            _ => Vec::new(),
        };
        self.state = State::Ready { index, history };

        tracing::info!(documents = count, chunks = chunk_count, "documents processed");
        Ok(chunk_count)
    }

    /// Answer `question` from the indexed documents and record the turn.
    ///
    /// With history present and condensing on, the follow-up is first
    /// rewritten into a standalone question. That rewrite only drives
    /// retrieval: the answer prompt and the history keep `question` as asked.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] before the first successful
    /// [`Session::process`], and embedding or generation errors otherwise.
    /// History is only extended when an answer is produced.
    pub async fn ask(&mut self, question: &str) -> Result<String, SessionError> {
        let State::Ready { index, history } = &mut self.state else {
            return Err(SessionError::NotReady);
        };

        let condensed = self.settings.condense_question && !history.is_empty();
        let search_text = if condensed {
            let rewritten = self
                .llm
                .complete(&prompt::condense_prompt(history, question), &[])
                .await
                .map_err(SessionError::Generation)?;
            let rewritten = rewritten.trim();
            if rewritten.is_empty() {
                question.to_owned()
            } else {
                tracing::debug!(standalone = rewritten, "condensed follow-up question");
                rewritten.to_owned()
            }
        } else {
            question.to_owned()
        };

        let query = self
            .embedder
            .embed(&search_text)
            .await
            .map_err(SessionError::Embedding)?;
        let hits = index.search(&query, self.settings.top_k)?;
        let hit_count = hits.len();
        let answer_prompt = prompt::answer_prompt(question, &hits);

        let answer = self
            .llm
            .complete(&answer_prompt, history)
            .await
            .map_err(SessionError::Generation)?;

        history.push(Message::user(question));
        history.push(Message::assistant(answer.clone()));

        tracing::info!(
            top_k = self.settings.top_k,
            hits = hit_count,
            condensed,
            provider = self.llm.name(),
            "question answered"
        );
        Ok(answer)
    }

    /// Question and answer messages, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        match &self.state {
            State::Idle => &[],
            State::Ready { history, .. } => history,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        match &self.state {
            State::Idle => 0,
            State::Ready { index, .. } => index.len(),
        }
    }

    #[must_use]
    pub fn index(&self) -> Option<&VectorIndex> {
        match &self.state {
            State::Idle => None,
            State::Ready { index, .. } => Some(index),
        }
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cvchat_llm::Role;
    use cvchat_llm::mock::{MockProvider, letter_histogram};
    use cvchat_memory::document::{PdfReadError, PdfReader, SplitterConfig};

    use super::*;

    /// Reads bytes as UTF-8 page text; a leading `!` marks a corrupt file.
    struct Utf8Reader;

    impl PdfReader for Utf8Reader {
        fn read_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfReadError> {
            let text = std::str::from_utf8(bytes).map_err(|e| PdfReadError(e.to_string()))?;
            if text.starts_with('!') {
                return Err(PdfReadError("unexpected end of stream".into()));
            }
            Ok(vec![text.to_owned()])
        }
    }

    /// Histogram embedder that fails for any text containing "explode".
    struct TrippingEmbedder;

    impl EmbeddingProvider for TrippingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            if text.contains("explode") {
                return Err(LlmError::Other("embedding backend down".into()));
            }
            Ok(letter_histogram(text))
        }
    }

    fn pipeline(chunk_size: usize, chunk_overlap: usize) -> IngestionPipeline {
        IngestionPipeline::new(
            TextExtractor::new(Arc::new(Utf8Reader)),
            TextSplitter::new(SplitterConfig {
                chunk_size,
                chunk_overlap,
                separator: "\n".into(),
            }),
        )
    }

    fn session_with<E: EmbeddingProvider>(
        embedder: E,
        llm: MockProvider,
        settings: SessionSettings,
    ) -> Session<E, MockProvider> {
        Session::new(embedder, llm, pipeline(10, 2), settings)
    }

    fn doc(text: &str) -> UploadedDocument {
        UploadedDocument::new("cv.pdf", text.as_bytes().to_vec())
    }

    fn no_condense() -> SessionSettings {
        SessionSettings {
            condense_question: false,
            ..SessionSettings::default()
        }
    }

    #[tokio::test]
    async fn ask_before_process_is_not_ready() {
        let mut session = session_with(
            MockProvider::default(),
            MockProvider::default(),
            SessionSettings::default(),
        );
        assert!(!session.is_ready());
        let err = session.ask("Who is this?").await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn process_then_ask_records_one_turn() {
        let llm = MockProvider::with_responses(vec!["Gamma is listed.".into()]);
        let mut session = session_with(MockProvider::default(), llm.clone(), no_condense());

        let chunks = session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        assert_eq!(chunks, 3);
        assert!(session.is_ready());
        assert_eq!(session.chunk_count(), 3);

        let answer = session.ask("gamma").await.unwrap();
        assert_eq!(answer, "Gamma is listed.");
        assert_eq!(
            session.history(),
            &[Message::user("gamma"), Message::assistant("Gamma is listed.")]
        );

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        let prompt = &calls[0].last().unwrap().content;
        assert!(prompt.contains("QUESTION: gamma"));
        assert!(prompt.contains("eta. Gamma"));
    }

    #[tokio::test]
    async fn retrieval_respects_top_k() {
        let llm = MockProvider::default();
        let settings = SessionSettings {
            top_k: 1,
            ..no_condense()
        };
        let mut session = session_with(MockProvider::default(), llm.clone(), settings);
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("alpha").await.unwrap();

        let prompt = &llm.calls()[0][0].content;
        assert!(prompt.contains("[1] (chunk"));
        assert!(!prompt.contains("[2] (chunk"));
    }

    #[tokio::test]
    async fn failed_process_keeps_previous_index_and_history() {
        let mut session = session_with(
            MockProvider::default(),
            MockProvider::default(),
            no_condense(),
        );
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("beta").await.unwrap();

        let err = session
            .process(vec![doc("Delta."), doc("!corrupt")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Document(DocumentError::Parse { index: 1, .. })
        ));
        assert!(session.is_ready());
        assert_eq!(session.chunk_count(), 3);
        assert_eq!(session.history().len(), 2);

        session.ask("gamma").await.unwrap();
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn failed_first_process_stays_idle() {
        let mut session = session_with(
            MockProvider::failing_embed(),
            MockProvider::default(),
            SessionSettings::default(),
        );
        let err = session.process(vec![doc("Alpha.")]).await.unwrap_err();
        assert!(matches!(err, SessionError::Index(IndexError::Embedding(_))));
        assert!(!session.is_ready());
        assert!(session.index().is_none());
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_ready_index_and_history() {
        let llm = MockProvider::default();
        let mut session = session_with(TrippingEmbedder, llm.clone(), no_condense());
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("beta").await.unwrap();

        let err = session.process(vec![doc("explode")]).await.unwrap_err();
        assert!(matches!(err, SessionError::Index(IndexError::Embedding(_))));
        assert!(session.is_ready());
        assert_eq!(session.chunk_count(), 3);
        assert_eq!(session.history().len(), 2);

        session.ask("gamma").await.unwrap();
        assert_eq!(session.history().len(), 4);
        let calls = llm.calls();
        assert!(calls[1].last().unwrap().content.contains("Gamma"));
    }

    #[tokio::test]
    async fn generation_failure_leaves_history_unchanged() {
        let mut session = session_with(
            MockProvider::default(),
            MockProvider::failing(),
            no_condense(),
        );
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();

        let err = session.ask("alpha").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert!(session.history().is_empty());
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn embedding_failure_leaves_history_unchanged() {
        let mut session = session_with(TrippingEmbedder, MockProvider::default(), no_condense());
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("alpha").await.unwrap();

        let err = session.ask("explode please").await.unwrap_err();
        assert!(matches!(err, SessionError::Embedding(_)));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn reprocess_clears_history_by_default() {
        let mut session = session_with(
            MockProvider::default(),
            MockProvider::default(),
            no_condense(),
        );
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("alpha").await.unwrap();
        assert_eq!(session.history().len(), 2);

        session.process(vec![doc("Delta. Epsilon.")]).await.unwrap();
        assert!(session.history().is_empty());
        assert_eq!(session.chunk_count(), 2);
    }

    #[tokio::test]
    async fn reprocess_can_keep_history() {
        let settings = SessionSettings {
            reset_history_on_process: false,
            ..no_condense()
        };
        let mut session = session_with(MockProvider::default(), MockProvider::default(), settings);
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("alpha").await.unwrap();

        session.process(vec![doc("Delta. Epsilon.")]).await.unwrap();
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn follow_up_is_condensed_before_retrieval() {
        let llm = MockProvider::with_responses(vec![
            "Alpha appears first.".into(),
            "Where does gamma appear?".into(),
            "At the end.".into(),
        ]);
        let mut session = session_with(
            MockProvider::default(),
            llm.clone(),
            SessionSettings::default(),
        );
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();

        session.ask("Where is alpha?").await.unwrap();
        let answer = session.ask("And the other one?").await.unwrap();
        assert_eq!(answer, "At the end.");

        let calls = llm.calls();
        assert_eq!(calls.len(), 3);

        // condensing call sees no history, only the rendered transcript
        assert_eq!(calls[1].len(), 1);
        assert!(calls[1][0].content.contains("Human: Where is alpha?"));
        assert!(calls[1][0].content.contains("Follow-up question: And the other one?"));

        // answer call gets the history plus the prompt with the question as asked
        assert_eq!(calls[2].len(), 3);
        assert_eq!(calls[2][0], Message::user("Where is alpha?"));
        assert_eq!(calls[2][1].role, Role::Assistant);
        assert!(calls[2][2].content.contains("QUESTION: And the other one?"));

        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn condensing_disabled_uses_single_call() {
        let llm = MockProvider::default();
        let mut session = session_with(MockProvider::default(), llm.clone(), no_condense());
        session.process(vec![doc("Alpha. Beta. Gamma.")]).await.unwrap();
        session.ask("first").await.unwrap();
        session.ask("second").await.unwrap();
        assert_eq!(llm.calls().len(), 2);
    }

    #[tokio::test]
    async fn empty_corpus_still_answers() {
        let llm = MockProvider::default();
        let mut session = session_with(MockProvider::default(), llm.clone(), no_condense());
        assert_eq!(session.process(vec![doc("")]).await.unwrap(), 0);
        assert!(session.is_ready());

        let answer = session.ask("anything?").await.unwrap();
        assert_eq!(answer, "mock response");
        assert!(llm.calls()[0][0].content.contains("(no matching excerpts)"));
    }

    #[test]
    fn settings_from_config() {
        let mut config = Config::default();
        config.retrieval.top_k = 7;
        config.retrieval.condense_question = false;
        config.session.reset_history_on_process = false;
        let settings = SessionSettings::from_config(&config);
        assert_eq!(
            settings,
            SessionSettings {
                top_k: 7,
                condense_question: false,
                reset_history_on_process: false,
            }
        );
    }

    #[tokio::test]
    async fn from_config_reads_real_pdfs() {
        let mut config = Config::default();
        config.document.chunk_size = 40;
        config.document.chunk_overlap = 5;
        let mut session = Session::from_config(
            MockProvider::default(),
            MockProvider::default(),
            &config,
        );
        let bytes = cvchat_memory::document::pdf::fixture::text_pdf(&["Jane Doe, Rust engineer"]);
        let chunks = session
            .process(vec![UploadedDocument::new("cv.pdf", bytes)])
            .await
            .unwrap();
        assert!(chunks >= 1);
        assert_eq!(session.settings().top_k, 4);
    }
}
