//! Test doubles for the persistence and media collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportDraft, ReportPatch};
use crate::modules::persistence::{
    MemoryReportStore, ReportFilter, ReportStore, ReportSubscription,
};
use crate::modules::storage::{MediaFile, MediaFolder, MediaStore};

/// How `RecordingStore::mutate` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    /// Apply to the backing memory store
    Apply,
    /// Return an error without touching state
    Fail,
    /// Report success but never apply, so no snapshot ever confirms it
    Swallow,
}

/// Memory store that records every mutation it is asked to perform
pub struct RecordingStore {
    inner: MemoryReportStore,
    mutations: Mutex<Vec<(String, ReportPatch)>>,
    mode: Mutex<MutationMode>,
}

impl RecordingStore {
    pub fn with_reports(reports: Vec<Report>) -> Self {
        Self {
            inner: MemoryReportStore::with_reports(reports),
            mutations: Mutex::new(Vec::new()),
            mode: Mutex::new(MutationMode::Apply),
        }
    }

    pub fn set_mode(&self, mode: MutationMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    pub fn mutations(&self) -> Vec<(String, ReportPatch)> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &MemoryReportStore {
        &self.inner
    }

    pub async fn canonical(&self, id: &str) -> Option<Report> {
        self.inner
            .query(&ReportFilter::default())
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == id)
    }
}

#[async_trait]
impl ReportStore for RecordingStore {
    async fn create(&self, draft: &ReportDraft) -> Result<String> {
        self.inner.create(draft).await
    }

    async fn subscribe(&self, filter: &ReportFilter) -> Result<ReportSubscription> {
        self.inner.subscribe(filter).await
    }

    async fn mutate(&self, id: &str, patch: &ReportPatch) -> Result<()> {
        self.mutations
            .lock()
            .unwrap()
            .push((id.to_string(), patch.clone()));

        let mode = *self.mode.lock().unwrap();
        match mode {
            MutationMode::Apply => self.inner.mutate(id, patch).await,
            MutationMode::Fail => Err(AppError::Internal("store unavailable".to_string())),
            MutationMode::Swallow => Ok(()),
        }
    }

    async fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        self.inner.query(filter).await
    }
}

/// What `StubMediaStore::upload` returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Url(String),
    NoUrl,
    Fail,
}

/// Media store with a scripted upload result and an optional gate that
/// holds uploads until released
pub struct StubMediaStore {
    outcome: Mutex<UploadOutcome>,
    uploads: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl StubMediaStore {
    pub fn returning(outcome: UploadOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            uploads: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(outcome: UploadOutcome, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::returning(outcome)
        }
    }

    pub fn set_outcome(&self, outcome: UploadOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStore for StubMediaStore {
    async fn upload(&self, _file: &MediaFile, _folder: MediaFolder) -> Result<Option<String>> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            UploadOutcome::Url(url) => Ok(Some(url)),
            UploadOutcome::NoUrl => Ok(None),
            UploadOutcome::Fail => Err(AppError::UploadFailed("connection reset".to_string())),
        }
    }
}

pub fn photo() -> MediaFile {
    MediaFile::new("after.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
}
