//! Payload dispatch.
//!
//! Turns the raw inner text of a completed marker region into a typed
//! result and applies its effect: a field update is written to the subject
//! record, a photo request is resolved into a fetched resource. A malformed
//! control payload must never abort the user-visible conversation, so every
//! failure here degrades to drop-and-log.

use crate::error::Result;
use crate::marker::{FieldUpdate, MarkerKind, PhotoRequest, RawPayload};
use crate::store::FieldStore;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// A photo reference resolved into a fetched resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPhoto {
    /// The original lookup query.
    pub query: String,

    /// Caption to show with the photo.
    pub caption: String,

    /// URL of the fetched photo.
    pub url: String,
}

/// Resolves a photo request against an external lookup service.
///
/// This is the boundary to the photo backend; the conversation never
/// depends on a lookup succeeding.
#[async_trait]
pub trait PhotoResolver: Send + Sync {
    /// Looks up a photo for the request.
    ///
    /// Returns `Ok(None)` when no photo exists for the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup service fails.
    async fn resolve(&self, request: &PhotoRequest) -> Result<Option<ResolvedPhoto>>;
}

/// Photo resolver used when no photo backend is configured.
///
/// Always reports that no photo was found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPhotoResolver;

#[async_trait]
impl PhotoResolver for NullPhotoResolver {
    async fn resolve(&self, _request: &PhotoRequest) -> Result<Option<ResolvedPhoto>> {
        Ok(None)
    }
}

/// Decoded fields of a dispatched payload, for the `payload_applied` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutcomeDetail {
    /// A decoded field update.
    Field(FieldUpdate),

    /// A photo request resolved to a fetched resource.
    Photo(ResolvedPhoto),

    /// A photo request that could not be resolved.
    PhotoMiss(PhotoRequest),
}

/// Result of dispatching one extracted payload.
///
/// Produced for every payload that decoded successfully, whether or not its
/// effect was applied; undecodable payloads are dropped and produce no
/// outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// Kind of the marker that carried the payload.
    pub marker: MarkerKind,

    /// Whether the payload's effect was applied.
    pub applied: bool,

    /// The decoded fields.
    #[serde(flatten)]
    pub detail: OutcomeDetail,
}

/// Dispatches extracted payloads to their registered actions.
///
/// Exactly one action exists per marker kind. Failures are isolated to the
/// payload: decode errors are counted and dropped, store and lookup
/// failures are reported in the outcome with `applied: false`.
pub struct PayloadDispatcher {
    /// Persistence collaborator for field updates.
    store: Arc<dyn FieldStore>,
    /// Lookup collaborator for photo requests.
    photos: Arc<dyn PhotoResolver>,
    /// Count of payloads dropped because they did not decode.
    decode_failures: AtomicU64,
}

impl PayloadDispatcher {
    /// Creates a dispatcher over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn FieldStore>, photos: Arc<dyn PhotoResolver>) -> Self {
        Self {
            store,
            photos,
            decode_failures: AtomicU64::new(0),
        }
    }

    /// Returns the number of payloads dropped as undecodable.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Decodes and applies one payload for the given subject.
    ///
    /// Returns `None` when the payload is undecodable (dropped, logged,
    /// counted); otherwise returns the outcome, with `applied` reflecting
    /// whether the effect took hold.
    pub async fn dispatch(&self, subject_id: &str, payload: &RawPayload) -> Option<DispatchOutcome> {
        match payload.kind {
            MarkerKind::TripUpdate => self.dispatch_field_update(subject_id, payload),
            MarkerKind::Photo => self.dispatch_photo(payload).await,
        }
    }

    fn dispatch_field_update(
        &self,
        subject_id: &str,
        payload: &RawPayload,
    ) -> Option<DispatchOutcome> {
        let update: FieldUpdate = self.decode(payload)?;
        if update.field.is_empty() {
            self.count_decode_failure(payload, "empty field name");
            return None;
        }

        let applied = match self.store.apply_update(subject_id, &update) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(subject = subject_id, field = %update.field, error = %e,
                    "field update failed");
                false
            }
        };
        Some(DispatchOutcome {
            marker: payload.kind,
            applied,
            detail: OutcomeDetail::Field(update),
        })
    }

    async fn dispatch_photo(&self, payload: &RawPayload) -> Option<DispatchOutcome> {
        let request: PhotoRequest = self.decode(payload)?;
        match self.photos.resolve(&request).await {
            Ok(Some(photo)) => Some(DispatchOutcome {
                marker: payload.kind,
                applied: true,
                detail: OutcomeDetail::Photo(photo),
            }),
            Ok(None) => {
                warn!(query = %request.query, "no photo found");
                Some(DispatchOutcome {
                    marker: payload.kind,
                    applied: false,
                    detail: OutcomeDetail::PhotoMiss(request),
                })
            }
            Err(e) => {
                warn!(query = %request.query, error = %e, "photo lookup failed");
                Some(DispatchOutcome {
                    marker: payload.kind,
                    applied: false,
                    detail: OutcomeDetail::PhotoMiss(request),
                })
            }
        }
    }

    /// Decodes the payload's trimmed inner text, dropping it on failure.
    fn decode<T: serde::de::DeserializeOwned>(&self, payload: &RawPayload) -> Option<T> {
        match serde_json::from_str(payload.raw.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                self.count_decode_failure(payload, &e.to_string());
                None
            }
        }
    }

    fn count_decode_failure(&self, payload: &RawPayload, reason: &str) {
        warn!(marker = %payload.kind, reason, "dropping undecodable payload");
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }
}
