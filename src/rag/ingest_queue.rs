//! Background ingestion.
//!
//! Uploads enqueue a storage reference and return immediately; one
//! detached worker drains the queue in arrival order. Failures land in a
//! bounded dead-letter list that operators can read back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::api::IngestRequest;
use super::orchestrator::RagOrchestrator;

const DEAD_LETTER_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub reference: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<String>,
    dead_letters: Arc<Mutex<VecDeque<DeadLetter>>>,
}

impl IngestQueue {
    /// Starts the worker. Must be called inside a tokio runtime.
    pub fn spawn(orchestrator: Arc<RagOrchestrator>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let dead_letters = Arc::new(Mutex::new(VecDeque::new()));
        let sink = dead_letters.clone();

        tokio::spawn(async move {
            while let Some(reference) = rx.recv().await {
                let request = IngestRequest {
                    document_storage_reference: reference.clone(),
                };
                match orchestrator.ingest(request).await {
                    Ok(response) => tracing::info!(
                        "Background ingestion of {} stored {} units",
                        reference,
                        response.chunk_count
                    ),
                    Err(err) => {
                        tracing::error!("Background ingestion of {} failed: {}", reference, err);
                        record_failure(&sink, reference, err.to_string());
                    }
                }
            }
            tracing::debug!("Ingest queue closed");
        });

        Self { tx, dead_letters }
    }

    /// Queues a storage reference for indexing. Never blocks; a stopped
    /// worker is only logged.
    pub fn enqueue(&self, reference: &str) {
        if self.tx.send(reference.to_string()).is_err() {
            tracing::error!("Ingest worker is not running; dropped {}", reference);
        }
    }

    /// Most recent failures, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let letters = self
            .dead_letters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        letters.iter().cloned().collect()
    }
}

fn record_failure(sink: &Mutex<VecDeque<DeadLetter>>, reference: String, error: String) {
    let mut letters = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if letters.len() == DEAD_LETTER_CAPACITY {
        letters.pop_front();
    }
    letters.push_back(DeadLetter {
        reference,
        error,
        failed_at: Utc::now(),
    });
}
