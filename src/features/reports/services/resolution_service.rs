//! Resolution gated behind photo evidence.
//!
//! A report only reaches `resolved` after its photo has been uploaded, and
//! the status and photo URL are always written together. Each attempt holds
//! a generation token; cancelling bumps the generation so a late upload is
//! discarded instead of committed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use super::state_machine::{ReportEvent, ReportStateMachine, Transition};
use super::sync_cache::SharedSyncCache;
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportStatus};
use crate::modules::persistence::ReportStore;
use crate::modules::storage::{MediaFile, MediaFolder, MediaStore, ALLOWED_IMAGE_TYPES};

/// In-flight resolution attempts. Generations are unique across all reports,
/// so a finished or cancelled attempt can never match a later one.
#[derive(Debug, Default)]
struct Attempts {
    next_generation: u64,
    /// Attempts that can still be cancelled, by report
    cancellable: HashMap<String, u64>,
    /// Attempts whose committing marker is shown, by report
    committing: HashMap<String, u64>,
}

impl Attempts {
    fn open(&mut self, report_id: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.cancellable.insert(report_id.to_string(), generation);
        self.committing.insert(report_id.to_string(), generation);
        generation
    }

    fn is_current(&self, report_id: &str, generation: u64) -> bool {
        self.cancellable.get(report_id) == Some(&generation)
    }

    /// Past this point the attempt writes through and cannot be cancelled
    fn seal(&mut self, report_id: &str, generation: u64) -> bool {
        if self.is_current(report_id, generation) {
            self.cancellable.remove(report_id);
            true
        } else {
            false
        }
    }

    fn cancel(&mut self, report_id: &str) -> bool {
        match self.cancellable.remove(report_id) {
            Some(_) => {
                self.committing.remove(report_id);
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, report_id: &str, generation: u64) {
        if self.cancellable.get(report_id) == Some(&generation) {
            self.cancellable.remove(report_id);
        }
        if self.committing.get(report_id) == Some(&generation) {
            self.committing.remove(report_id);
        }
    }
}

/// Ends an attempt when it goes out of scope, however it ends.
/// Entries belonging to a newer attempt are left alone.
struct CommittingMarker<'a> {
    attempts: &'a Mutex<Attempts>,
    report_id: &'a str,
    generation: u64,
}

impl Drop for CommittingMarker<'_> {
    fn drop(&mut self) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish(self.report_id, self.generation);
    }
}

pub struct MediaGatedResolutionWorkflow {
    cache: Arc<SharedSyncCache>,
    store: Arc<dyn ReportStore>,
    media: Arc<dyn MediaStore>,
    max_upload_size_mb: u64,
    attempts: Mutex<Attempts>,
}

impl MediaGatedResolutionWorkflow {
    pub fn new(
        cache: Arc<SharedSyncCache>,
        store: Arc<dyn ReportStore>,
        media: Arc<dyn MediaStore>,
        max_upload_size_mb: u64,
    ) -> Self {
        Self {
            cache,
            store,
            media,
            max_upload_size_mb,
            attempts: Mutex::new(Attempts::default()),
        }
    }

    fn attempts(&self) -> std::sync::MutexGuard<'_, Attempts> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate, upload, then commit `{status: resolved, resolved_image_ref}`
    /// as one override and one mutation.
    pub async fn resolve(&self, report_id: &str, photo: Option<MediaFile>) -> Result<Report> {
        let photo = photo.ok_or_else(|| {
            AppError::InvalidMedia("A photo is required to resolve a report".to_string())
        })?;
        self.check_photo(&photo)?;

        let current = self
            .cache
            .effective(report_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;
        if current.status == ReportStatus::Resolved {
            return Err(AppError::AlreadyResolved(format!(
                "Report {} is already resolved",
                report_id
            )));
        }

        let generation = self.attempts().open(report_id);
        let _marker = CommittingMarker {
            attempts: &self.attempts,
            report_id,
            generation,
        };
        debug!(
            "Resolution attempt {} opened for report {}",
            generation, report_id
        );

        let photo_url = match self.media.upload(&photo, MediaFolder::Resolutions).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                warn!("Upload for report {} returned no URL", report_id);
                return Err(AppError::UploadFailed(
                    "Storage returned no URL for the photo".to_string(),
                ));
            }
            Err(e) => {
                warn!("Upload for report {} failed: {}", report_id, e);
                return Err(AppError::UploadFailed(format!(
                    "Could not upload resolution photo: {}",
                    e
                )));
            }
        };

        if !self.attempts().is_current(report_id, generation) {
            warn!(
                "Discarding photo {} for report {}: attempt {} was cancelled",
                photo_url, report_id, generation
            );
            return Err(AppError::ResolutionCancelled(format!(
                "Resolution of report {} was cancelled",
                report_id
            )));
        }

        // Someone else may have resolved it during the upload
        let current = self
            .cache
            .effective(report_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;
        let event = ReportEvent::Resolve {
            photo_ref: photo_url.clone(),
        };

        match ReportStateMachine::transition(&current, &event)? {
            Transition::Noop => Ok(current),
            Transition::Apply(patch) => {
                let sealed = self
                    .cache
                    .commit_guarded(self.store.as_ref(), report_id, patch, |cache| {
                        if cache
                            .effective(report_id)
                            .is_some_and(|r| r.status == ReportStatus::Resolved)
                        {
                            return Err(AppError::AlreadyResolved(format!(
                                "Report {} is already resolved",
                                report_id
                            )));
                        }
                        if !self.attempts().seal(report_id, generation) {
                            return Err(AppError::ResolutionCancelled(format!(
                                "Resolution of report {} was cancelled",
                                report_id
                            )));
                        }
                        Ok(())
                    })
                    .await;

                if let Err(e) = sealed {
                    match e {
                        AppError::ResolutionCancelled(_) | AppError::AlreadyResolved(_) => warn!(
                            "Discarding photo {} for report {}: {}",
                            photo_url, report_id, e
                        ),
                        _ => error!(
                            "Report {} not resolved; uploaded photo {} is unreferenced",
                            report_id, photo_url
                        ),
                    }
                    return Err(e);
                }

                info!("Report {} resolved with photo {}", report_id, photo_url);
                self.cache
                    .effective(report_id)
                    .await
                    .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))
            }
        }
    }

    /// Abandon any in-flight attempt for `report_id`. Returns whether one was
    /// in flight.
    pub async fn cancel(&self, report_id: &str) -> bool {
        let was_in_flight = self.attempts().cancel(report_id);

        let mut cache = self.cache.write().await;
        let pending_resolution = cache
            .override_patch(report_id)
            .is_some_and(|patch| patch.status == Some(ReportStatus::Resolved));
        if pending_resolution {
            cache.discard(report_id);
        }

        if was_in_flight {
            info!("Resolution of report {} cancelled", report_id);
        }
        was_in_flight
    }

    pub fn is_committing(&self, report_id: &str) -> bool {
        self.attempts().committing.contains_key(report_id)
    }

    pub fn committing_ids(&self) -> HashSet<String> {
        self.attempts().committing.keys().cloned().collect()
    }

    fn check_photo(&self, photo: &MediaFile) -> Result<()> {
        let validation = self.media.validate(photo, self.max_upload_size_mb);
        if !validation.valid {
            return Err(AppError::InvalidMedia(
                validation
                    .error
                    .unwrap_or_else(|| "Photo rejected".to_string()),
            ));
        }

        if !ALLOWED_IMAGE_TYPES.contains(&photo.content_type.as_str()) {
            return Err(AppError::InvalidMedia(format!(
                "Resolution evidence must be an image, got '{}'",
                photo.content_type
            )));
        }

        Ok(())
    }
}
