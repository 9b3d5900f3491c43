#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests of indexing and answering against stand-in providers
//!
//! Embedding and chat providers are served by wiremock; the chunk store is a
//! SQLite file in a temporary configuration directory.

use std::sync::Arc;

use futures::StreamExt;
use pdf_rag::config::{Config, IndexingMode, StoreBackend};
use pdf_rag::database::{VectorIndex, open_index};
use pdf_rag::extract::{ExtractedDocument, PlainTextExtractor, TextExtractor, split_pages};
use pdf_rag::indexer::{DocumentUpload, IndexEvent, Indexer, NO_TEXT_MESSAGE};
use pdf_rag::providers::Providers;
use pdf_rag::query::{QueryEngine, QueryRequest};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// One axis per distinct page so every chunk gets its own direction
const PAGES: [&str; 5] = [
    "alpha introduces the topic",
    "bravo describes the method",
    "charlie reports the results",
    "delta discusses limitations",
    "echo concludes the paper",
];

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn axis_embedding(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
    let prompt = body["prompt"].as_str().unwrap_or_default();
    let embedding: Vec<f32> = ["alpha", "bravo", "charlie", "delta", "echo"]
        .iter()
        .map(|word| if prompt.contains(word) { 1.0 } else { 0.0 })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({"embedding": embedding}))
}

async fn start_providers() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({"model": "ghost-embed"})))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": "model \"ghost-embed\" not found, try pulling it first"})),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(axis_embedding)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "The results are on page 3."}
        })))
        .mount(&server)
        .await;

    server
}

fn config_for(server: &MockServer, dir: &TempDir, mode: IndexingMode) -> Config {
    let mut config = Config::load(dir.path()).expect("default config");
    let address = server.address();
    config.embedding.host = address.ip().to_string();
    config.embedding.port = address.port();
    config.embedding.timeout_secs = 5;
    config.chat.ollama_base_url = server.uri();
    config.chat.timeout_secs = 5;
    config.store.backend = StoreBackend::Sqlite;
    config.store.indexing_mode = mode;
    config
}

fn paged_upload() -> DocumentUpload {
    // Page breaks are form feeds, as produced by PDF text extraction
    DocumentUpload::new("paper.txt", None, PAGES.join("\u{c}").into_bytes()).expect("valid upload")
}

async fn index_all(
    config: &Config,
    index: Arc<dyn VectorIndex>,
    upload: DocumentUpload,
    embedding_model: Option<&str>,
) -> Vec<IndexEvent> {
    let embedder = Providers::from_config(config)
        .embedder(embedding_model)
        .expect("embedder builds");
    Indexer::from_config(config, index)
        .index(upload, Arc::new(PaginatedText), embedder)
        .collect()
        .await
}

/// Plain text extractor that keeps form-feed page breaks
struct PaginatedText;

impl TextExtractor for PaginatedText {
    fn extract(&self, bytes: &[u8]) -> pdf_rag::Result<ExtractedDocument> {
        let mut document = PlainTextExtractor.extract(bytes)?;
        document.pages = split_pages(&document.text);
        Ok(document)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn index_then_answer_with_page_citations() {
    init_test_tracing();
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Atomic);
    let index = open_index(&config).await.expect("index opens");

    let events = index_all(&config, Arc::clone(&index), paged_upload(), None).await;
    assert_eq!(
        events.last(),
        Some(&IndexEvent::Complete {
            indexed_count: 5,
            message: None
        })
    );
    let progress = events
        .iter()
        .filter(|e| matches!(e, IndexEvent::Progress { .. }))
        .count();
    assert_eq!(progress, 5);

    let providers = Providers::from_config(&config);
    let embedder = providers.embedder(None).expect("embedder");
    let chat = providers.chat(None, None).expect("chat");
    let answer = QueryEngine::from_config(&config, Arc::clone(&index))
        .answer(
            &QueryRequest::new("what did charlie report?"),
            embedder.as_ref(),
            chat.as_ref(),
        )
        .await
        .expect("answer");

    assert_eq!(answer.reply, "The results are on page 3.");
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.sources[0].index, 2);
    assert_eq!(answer.sources[0].page_number, Some(3));
    assert!((answer.sources[0].score - 1.0).abs() < 1e-6);

    let chat_requests: Vec<Value> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/chat")
        .map(|r| serde_json::from_slice(&r.body).expect("chat body is json"))
        .collect();
    assert_eq!(chat_requests.len(), 1);
    let system = chat_requests[0]["messages"][0]["content"]
        .as_str()
        .expect("system prompt");
    assert!(system.contains("[Page 3]\ncharlie reports the results"));
}

#[tokio::test(flavor = "multi_thread")]
async fn reindexing_replaces_previous_document() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Incremental);
    let index = open_index(&config).await.expect("index opens");

    index_all(&config, Arc::clone(&index), paged_upload(), None).await;
    let second = DocumentUpload::new("short.txt", None, b"echo only".to_vec()).expect("upload");
    let events = index_all(&config, Arc::clone(&index), second, None).await;

    assert_eq!(
        events.last(),
        Some(&IndexEvent::Complete {
            indexed_count: 1,
            message: None
        })
    );
    assert!(index.fetch_all("paper.txt").await.expect("fetch").is_empty());
    let summary = index
        .active_document()
        .await
        .expect("summary")
        .expect("document active");
    assert_eq!(summary.name, "short.txt");
    assert_eq!(summary.chunk_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn chunks_survive_reopening_the_store() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Atomic);

    {
        let index = open_index(&config).await.expect("index opens");
        index_all(&config, index, paged_upload(), None).await;
    }

    let reopened = open_index(&config).await.expect("index reopens");
    let chunks = reopened.fetch_all("paper.txt").await.expect("fetch");
    assert_eq!(chunks.len(), 5);
    let charlie = chunks.iter().find(|c| c.index == 2).expect("chunk 2 stored");
    assert_eq!(charlie.embedding, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn later_questions_reuse_the_indexing_model() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Atomic);

    {
        let index = open_index(&config).await.expect("index opens");
        index_all(&config, index, paged_upload(), Some("axis-embed")).await;
    }

    let reopened = open_index(&config).await.expect("index reopens");
    let providers = Providers::from_config(&config);
    let engine = QueryEngine::from_config(&config, reopened);
    let embedder = engine.embedder_for(&providers, None).await.expect("embedder");
    assert_eq!(embedder.model(), "axis-embed");

    let chat = providers.chat(None, None).expect("chat");
    let answer = engine
        .answer(
            &QueryRequest::new("what did delta discuss?"),
            embedder.as_ref(),
            chat.as_ref(),
        )
        .await
        .expect("answer");
    assert_eq!(answer.sources[0].index, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_embedding_model_ends_with_error_naming_it() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Atomic);
    let index = open_index(&config).await.expect("index opens");

    let events = index_all(&config, index, paged_upload(), Some("ghost-embed")).await;

    assert_eq!(events.len(), 2);
    match events.last() {
        Some(IndexEvent::Error { message }) => {
            assert!(message.contains("ghost-embed"), "{message}");
            assert!(message.contains("ollama pull"), "{message}");
        }
        other => panic!("expected a final error event, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn document_without_text_is_not_an_error() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Atomic);
    let index = open_index(&config).await.expect("index opens");

    let blank = DocumentUpload::new("scan.txt", None, b"\n \x0c \n".to_vec()).expect("upload");
    let events = index_all(&config, index, blank, None).await;

    assert_eq!(
        events.last(),
        Some(&IndexEvent::Complete {
            indexed_count: 0,
            message: Some(NO_TEXT_MESSAGE.to_string())
        })
    );
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn abandoned_run_stops_calling_the_provider() {
    let server = start_providers().await;
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(&server, &dir, IndexingMode::Incremental);
    let index = open_index(&config).await.expect("index opens");
    let embedder = Providers::from_config(&config)
        .embedder(None)
        .expect("embedder");

    let stream = Indexer::from_config(&config, Arc::clone(&index)).index(
        paged_upload(),
        Arc::new(PaginatedText),
        embedder,
    );
    let seen: Vec<IndexEvent> = stream.take(3).collect().await;
    assert_eq!(seen[2], IndexEvent::Progress { current: 2, total: 5 });

    let embedding_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/embeddings")
        .count();
    assert_eq!(embedding_calls, 2);
    assert_eq!(index.fetch_all("paper.txt").await.expect("fetch").len(), 2);
}
