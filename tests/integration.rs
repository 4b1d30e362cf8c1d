use std::sync::Arc;

use cvchat_core::{Session, SessionError, SessionSettings};
use cvchat_llm::mock::{MockProvider, letter_histogram};
use cvchat_llm::{EmbeddingProvider, LlmError, Message};
use cvchat_memory::document::pdf::fixture::text_pdf;
use cvchat_memory::document::{
    IngestionPipeline, PdfReadError, PdfReader, SplitterConfig, TextExtractor, TextSplitter,
    UploadedDocument, reassemble,
};
use cvchat_memory::VectorIndex;

// -- Test doubles --

/// Page text is the raw bytes; `%PDF-broken` marks an unreadable file.
struct PlainTextReader;

impl PdfReader for PlainTextReader {
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfReadError> {
        if bytes.starts_with(b"%PDF-broken") {
            return Err(PdfReadError("invalid file header".into()));
        }
        String::from_utf8(bytes.to_vec())
            .map(|page| vec![page])
            .map_err(|e| PdfReadError(e.to_string()))
    }
}

/// Counts embedding calls so rebuild determinism can be checked against one provider.
#[derive(Clone, Default)]
struct CountingEmbedder {
    calls: Arc<std::sync::atomic::AtomicUsize>,
}

impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(letter_histogram(text))
    }
}

fn pipeline(chunk_size: usize, chunk_overlap: usize) -> IngestionPipeline {
    IngestionPipeline::new(
        TextExtractor::new(Arc::new(PlainTextReader)),
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            separator: "\n".into(),
        }),
    )
}

fn settings() -> SessionSettings {
    SessionSettings {
        top_k: 2,
        condense_question: false,
        reset_history_on_process: true,
    }
}

// -- End-to-end --

#[tokio::test]
async fn alpha_beta_gamma_round_trip() {
    let text = "Alpha. Beta. Gamma.";
    let p = pipeline(10, 2);

    let chunks = p
        .chunk_documents(vec![UploadedDocument::new("cv.pdf", text)])
        .await
        .unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(chunk.char_len() <= 10);
        if i > 0 {
            assert!(chunk.overlap >= 2);
        }
    }
    assert_eq!(reassemble(&chunks), text);

    let llm = MockProvider::with_responses(vec!["Gamma comes last.".into()]);
    let mut session = Session::new(MockProvider::default(), llm.clone(), p, settings());
    session
        .process(vec![UploadedDocument::new("cv.pdf", text)])
        .await
        .unwrap();

    let answer = session.ask("Gamma?").await.unwrap();
    assert!(!answer.is_empty());
    assert_eq!(
        session.history(),
        &[Message::user("Gamma?"), Message::assistant("Gamma comes last.")]
    );

    // the most similar chunk is ranked first in the prompt
    let index = session.index().unwrap();
    let hits = index.search(&letter_histogram("Gamma?"), 1).unwrap();
    let best = hits[0].chunk;
    let calls = llm.calls();
    let prompt = &calls[0].last().unwrap().content;
    assert!(prompt.contains(&format!(
        "[1] (chunk {})\n{}",
        best.chunk_index,
        best.content.trim()
    )));
}

#[tokio::test]
async fn real_pdf_end_to_end() {
    let pdf = text_pdf(&[
        "Jane Doe - Senior Rust Engineer",
        "Experience: Acme Corp, distributed storage",
    ]);
    let llm = MockProvider::with_responses(vec!["Acme Corp.".into()]);
    let mut config = cvchat_core::Config::default();
    config.document.chunk_size = 24;
    config.document.chunk_overlap = 4;
    config.retrieval.condense_question = false;
    let mut session = Session::from_config(MockProvider::default(), llm.clone(), &config);

    let chunk_count = session
        .process(vec![UploadedDocument::new("jane.pdf", pdf)])
        .await
        .unwrap();
    assert!(chunk_count >= 2);

    let answer = session.ask("Where did Jane work?").await.unwrap();
    assert_eq!(answer, "Acme Corp.");
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn corrupt_reprocess_keeps_prior_index_queryable() {
    let mut session = Session::new(
        MockProvider::default(),
        MockProvider::default(),
        pipeline(10, 2),
        settings(),
    );
    session
        .process(vec![UploadedDocument::new("cv.pdf", "Alpha. Beta. Gamma.")])
        .await
        .unwrap();
    let before: Vec<String> = session
        .index()
        .unwrap()
        .chunks()
        .map(|c| c.content.clone())
        .collect();

    let err = session
        .process(vec![UploadedDocument::new("bad.pdf", "%PDF-broken")])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Document(_)));

    let after: Vec<String> = session
        .index()
        .unwrap()
        .chunks()
        .map(|c| c.content.clone())
        .collect();
    assert_eq!(before, after);
    assert!(session.ask("Beta?").await.is_ok());
}

#[tokio::test]
async fn failed_ask_keeps_history_length() {
    let mut session = Session::new(
        MockProvider::default(),
        MockProvider::failing(),
        pipeline(10, 2),
        settings(),
    );
    session
        .process(vec![UploadedDocument::new("cv.pdf", "Alpha. Beta. Gamma.")])
        .await
        .unwrap();
    assert!(session.ask("Alpha?").await.is_err());
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn rebuilding_index_gives_same_ranking() {
    let embedder = CountingEmbedder::default();
    let chunks = pipeline(12, 3).split("Rust engineer\nGo developer\nPython data scientist\n");

    let first = VectorIndex::build(chunks.clone(), &embedder).await.unwrap();
    let second = VectorIndex::build(chunks.clone(), &embedder).await.unwrap();
    assert_eq!(
        embedder.calls.load(std::sync::atomic::Ordering::Relaxed),
        chunks.len() * 2
    );

    let query = letter_histogram("python");
    let rank = |index: &VectorIndex| -> Vec<usize> {
        index
            .search(&query, chunks.len())
            .unwrap()
            .into_iter()
            .map(|hit| hit.chunk.chunk_index)
            .collect()
    };
    assert_eq!(rank(&first), rank(&second));
}

#[tokio::test]
async fn documents_concatenate_in_upload_order() {
    let docs = vec![
        UploadedDocument::new("one.pdf", "first|"),
        UploadedDocument::new("two.pdf", "second|"),
    ];
    let corpus = pipeline(100, 10).extract(docs).await.unwrap();
    assert_eq!(corpus, "first|second|");
}
