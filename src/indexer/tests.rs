use super::*;
use crate::database::MemoryIndex;
use crate::extract::{ExtractedDocument, Page, PlainTextExtractor};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embeds text as `[len, vowels]`, optionally failing or changing shape on one call
#[derive(Default)]
struct FakeEmbedder {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    widen_on: Option<usize>,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(RagError::Provider(
                "model 'fake-embed' not found, try `ollama pull fake-embed`".to_string(),
            ));
        }

        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
        let mut embedding = vec![text.len() as f32, vowels as f32];
        if self.widen_on == Some(call) {
            embedding.push(1.0);
        }
        Ok(embedding)
    }
}

struct FixedExtractor(ExtractedDocument);

impl TextExtractor for FixedExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<ExtractedDocument> {
        Ok(self.0.clone())
    }
}

fn memory_index() -> Arc<dyn VectorIndex> {
    Arc::new(MemoryIndex::new())
}

fn settings() -> ChunkingSettings {
    ChunkingSettings {
        chunk_size: 10,
        overlap: 2,
    }
}

fn upload(text: &str) -> DocumentUpload {
    DocumentUpload::new("notes.txt", Some("text/plain".to_string()), text.as_bytes().to_vec())
        .expect("valid upload")
}

async fn run(
    indexer: &Indexer,
    upload: DocumentUpload,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<FakeEmbedder>,
) -> Vec<IndexEvent> {
    indexer.index(upload, extractor, embedder).collect().await
}

#[tokio::test]
async fn atomic_run_reports_progress_then_completes() {
    let index = memory_index();
    let indexer = Indexer::new(Arc::clone(&index), settings(), IndexingMode::Atomic);
    let embedder = Arc::new(FakeEmbedder::default());

    // 30 characters with step 8 gives windows at 0, 8, 16, 24
    let events = run(
        &indexer,
        upload("abcdefghijklmnopqrstuvwxyz0123"),
        Arc::new(PlainTextExtractor),
        Arc::clone(&embedder),
    )
    .await;

    assert_eq!(
        events,
        vec![
            IndexEvent::Parsing,
            IndexEvent::Progress { current: 1, total: 4 },
            IndexEvent::Progress { current: 2, total: 4 },
            IndexEvent::Progress { current: 3, total: 4 },
            IndexEvent::Progress { current: 4, total: 4 },
            IndexEvent::Complete {
                indexed_count: 4,
                message: None
            },
        ]
    );
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);

    let stored = index.fetch_all("notes.txt").await.expect("fetch");
    let indices: Vec<usize> = stored.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(stored[1].text, "ijklmnopqr");
    assert!(stored.iter().all(|c| c.page_number == Some(1)));

    let summary = index
        .active_document()
        .await
        .expect("summary")
        .expect("document is active");
    assert_eq!(summary.embedding_model.as_deref(), Some("fake-embed"));
    assert_eq!(summary.dimension, Some(2));
}

#[tokio::test]
async fn incremental_run_stores_chunks_as_they_are_embedded() {
    let index = memory_index();
    index
        .replace_all("old.pdf", "nomic-embed-text", vec![])
        .await
        .expect("seed old document");
    let indexer = Indexer::new(Arc::clone(&index), settings(), IndexingMode::Incremental);

    let extractor = FixedExtractor(ExtractedDocument {
        text: String::new(),
        pages: Some(vec![
            Page {
                number: 1,
                text: "first page".to_string(),
            },
            Page {
                number: 2,
                text: "second".to_string(),
            },
        ]),
    });

    let events = indexer.index(
        upload("ignored"),
        Arc::new(extractor),
        Arc::new(FakeEmbedder::default()),
    );
    let mut stream = std::pin::pin!(events);

    assert_eq!(stream.next().await, Some(IndexEvent::Parsing));
    assert_eq!(
        stream.next().await,
        Some(IndexEvent::Progress { current: 1, total: 3 })
    );
    // The first chunk is visible before the run finishes
    let partial = index.fetch_all("notes.txt").await.expect("fetch");
    assert_eq!(partial.len(), 1);
    assert!(index.fetch_all("old.pdf").await.expect("fetch").is_empty());

    let rest: Vec<IndexEvent> = stream.collect().await;
    assert_eq!(
        rest.last(),
        Some(&IndexEvent::Complete {
            indexed_count: 3,
            message: None
        })
    );

    let mut pages: Vec<(usize, Option<u32>)> = index
        .fetch_all("notes.txt")
        .await
        .expect("fetch")
        .iter()
        .map(|c| (c.index, c.page_number))
        .collect();
    pages.sort_unstable();
    assert_eq!(pages, vec![(0, Some(1)), (1, Some(1)), (2, Some(2))]);

    // The truncating replace has no chunks, so the first insert fixes the dimension
    let summary = index
        .active_document()
        .await
        .expect("summary")
        .expect("document is active");
    assert_eq!(summary.embedding_model.as_deref(), Some("fake-embed"));
    assert_eq!(summary.dimension, Some(2));
}

#[tokio::test]
async fn document_without_text_completes_empty() {
    let index = memory_index();
    let indexer = Indexer::new(Arc::clone(&index), settings(), IndexingMode::Atomic);
    let embedder = Arc::new(FakeEmbedder::default());

    let events = run(
        &indexer,
        upload("  \n\t  "),
        Arc::new(PlainTextExtractor),
        Arc::clone(&embedder),
    )
    .await;

    assert_eq!(
        events.last(),
        Some(&IndexEvent::Complete {
            indexed_count: 0,
            message: Some(NO_TEXT_MESSAGE.to_string())
        })
    );
    assert!(!events.iter().any(|e| matches!(e, IndexEvent::Error { .. })));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

    let summary = index
        .active_document()
        .await
        .expect("summary")
        .expect("empty document is active");
    assert_eq!(summary.chunk_count, 0);
}

#[tokio::test]
async fn provider_failure_is_the_final_event() {
    let index = memory_index();
    index
        .replace_all(
            "old.pdf",
            "nomic-embed-text",
            vec![Chunk {
                document: "old.pdf".to_string(),
                index: 0,
                page_number: None,
                text: "kept".to_string(),
                embedding: vec![1.0],
            }],
        )
        .await
        .expect("seed");
    let indexer = Indexer::new(Arc::clone(&index), settings(), IndexingMode::Atomic);
    let embedder = Arc::new(FakeEmbedder {
        fail_on: Some(1),
        ..FakeEmbedder::default()
    });

    let events = run(
        &indexer,
        upload("abcdefghijklmnopqrstuvwxyz0123"),
        Arc::new(PlainTextExtractor),
        Arc::clone(&embedder),
    )
    .await;

    assert_eq!(events.len(), 3);
    match events.last() {
        Some(IndexEvent::Error { message }) => assert!(message.contains("fake-embed"), "{message}"),
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    // Atomic runs leave the previous document untouched on failure
    assert_eq!(index.fetch_all("old.pdf").await.expect("fetch").len(), 1);
}

#[tokio::test]
async fn dimension_change_aborts_run() {
    let index = memory_index();
    let indexer = Indexer::new(index, settings(), IndexingMode::Atomic);
    let embedder = Arc::new(FakeEmbedder {
        widen_on: Some(2),
        ..FakeEmbedder::default()
    });

    let events = run(
        &indexer,
        upload("abcdefghijklmnopqrstuvwxyz0123"),
        Arc::new(PlainTextExtractor),
        embedder,
    )
    .await;

    match events.last() {
        Some(IndexEvent::Error { message }) => {
            assert!(message.contains("3 dimensions"), "{message}");
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn extraction_failure_is_reported_as_event() {
    let indexer = Indexer::new(Arc::new(MemoryIndex::new()), settings(), IndexingMode::Atomic);

    let events = run(
        &indexer,
        upload("not a pdf"),
        Arc::new(crate::extract::PdfExtractor),
        Arc::new(FakeEmbedder::default()),
    )
    .await;

    assert_eq!(events.first(), Some(&IndexEvent::Parsing));
    assert!(matches!(events.last(), Some(IndexEvent::Error { .. })));
    assert!(events.last().is_some_and(IndexEvent::is_terminal));
}

#[tokio::test]
async fn dropping_the_stream_stops_embedding() {
    let indexer = Indexer::new(Arc::new(MemoryIndex::new()), settings(), IndexingMode::Atomic);
    let embedder = Arc::new(FakeEmbedder::default());

    {
        let handle = Arc::clone(&embedder);
        let stream = indexer.index(
            upload("abcdefghijklmnopqrstuvwxyz0123"),
            Arc::new(PlainTextExtractor),
            handle,
        );
        let first_two: Vec<IndexEvent> = stream.take(2).collect().await;
        assert_eq!(first_two[1], IndexEvent::Progress { current: 1, total: 4 });
    }

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn upload_names_are_reduced_to_file_names() {
    let upload = DocumentUpload::new("../../etc/report.pdf", None, vec![1, 2, 3])
        .expect("valid upload");
    assert_eq!(upload.filename, "report.pdf");

    assert!(matches!(
        DocumentUpload::new("  ", None, Vec::new()),
        Err(RagError::Input(_))
    ));
}

#[test]
fn events_serialize_as_status_records() {
    let lines: Vec<String> = [
        IndexEvent::Parsing,
        IndexEvent::Progress { current: 2, total: 5 },
        IndexEvent::Complete {
            indexed_count: 5,
            message: None,
        },
        IndexEvent::Error {
            message: "boom".to_string(),
        },
    ]
    .iter()
    .map(IndexEvent::to_ndjson)
    .collect();

    assert_eq!(lines[0], "{\"status\":\"parsing\"}\n");
    assert_eq!(lines[1], "{\"status\":\"progress\",\"current\":2,\"total\":5}\n");
    assert_eq!(lines[2], "{\"status\":\"complete\",\"indexed_count\":5}\n");
    assert_eq!(lines[3], "{\"status\":\"error\",\"message\":\"boom\"}\n");

    let parsed: IndexEvent = serde_json::from_str(lines[2].trim()).expect("parses");
    assert!(parsed.is_terminal());
}
