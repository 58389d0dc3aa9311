//! Invalidation Module
//!
//! Translates "entity X changed" into the cache entries that must go.
//! When unsure whether a list view includes the entity, the whole list
//! prefix of the namespace is dropped. Failures are logged and counted,
//! never returned: a write path must not fail because the cache is down.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheManager, Namespace, NamespaceCache};
use crate::keys::{self, LIST_PREFIX, USER_EVENTS_PREFIX};

/// What an invalidation call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// Entries removed
    pub removed: usize,
    /// Operations that failed and were logged
    pub failed: usize,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn merge(&mut self, other: InvalidationReport) {
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// Grouped invalidation over the built-in namespaces.
#[derive(Debug, Clone)]
pub struct Invalidator {
    events: NamespaceCache,
    users: NamespaceCache,
    images: NamespaceCache,
    videos: NamespaceCache,
    documents: NamespaceCache,
    coordination: NamespaceCache,
    api: NamespaceCache,
}

impl Invalidator {
    pub fn new(manager: &CacheManager) -> Self {
        Self {
            events: manager.namespace(&Namespace::EVENT),
            users: manager.namespace(&Namespace::USER),
            images: manager.namespace(&Namespace::IMAGE),
            videos: manager.namespace(&Namespace::VIDEO),
            documents: manager.namespace(&Namespace::DOCUMENT),
            coordination: manager.namespace(&Namespace::COORDINATION),
            api: manager.namespace(&Namespace::API),
        }
    }

    /// An event record was created, updated or deleted.
    ///
    /// Drops the event's own entries, its attached media and coordination
    /// views, every event list, every member's event list, and cached API
    /// responses.
    pub async fn event_changed(&self, event_id: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        report.merge(delete(&self.events, &keys::event_detail(event_id)).await);
        report.merge(delete(&self.events, &keys::event_attendees(event_id)).await);
        report.merge(clear_prefix(&self.events, LIST_PREFIX).await);
        report.merge(delete(&self.coordination, &keys::coordination(event_id)).await);
        for media in [&self.images, &self.videos, &self.documents] {
            report.merge(delete(media, &keys::event_media(event_id)).await);
        }
        report.merge(clear_prefix(&self.users, USER_EVENTS_PREFIX).await);
        report.merge(clear_prefix(&self.api, "").await);
        log_report("event", event_id, report);
        report
    }

    /// A member's profile or role changed.
    pub async fn user_changed(&self, user_id: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        report.merge(delete(&self.users, &keys::user_profile(user_id)).await);
        report.merge(delete(&self.users, &keys::user_events(user_id)).await);
        report.merge(clear_prefix(&self.users, LIST_PREFIX).await);
        log_report("user", user_id, report);
        report
    }

    /// A member registered for or withdrew from an event.
    ///
    /// Event lists carry attendance counts, so they are dropped too.
    pub async fn attendance_changed(&self, event_id: &str, user_id: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        report.merge(delete(&self.events, &keys::event_attendees(event_id)).await);
        report.merge(delete(&self.events, &keys::event_detail(event_id)).await);
        report.merge(clear_prefix(&self.events, LIST_PREFIX).await);
        report.merge(delete(&self.users, &keys::user_events(user_id)).await);
        log_report("attendance", event_id, report);
        report
    }

    /// An image was uploaded, replaced or removed.
    pub async fn image_changed(&self, image_id: &str, event_id: Option<&str>) -> InvalidationReport {
        self.media_changed(&self.images, image_id, event_id).await
    }

    /// A video was uploaded, replaced or removed.
    pub async fn video_changed(&self, video_id: &str, event_id: Option<&str>) -> InvalidationReport {
        self.media_changed(&self.videos, video_id, event_id).await
    }

    /// A document was uploaded, replaced or removed.
    pub async fn document_changed(
        &self,
        document_id: &str,
        event_id: Option<&str>,
    ) -> InvalidationReport {
        self.media_changed(&self.documents, document_id, event_id).await
    }

    /// A coordination record of an event changed.
    pub async fn coordination_changed(&self, event_id: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        report.merge(delete(&self.coordination, &keys::coordination(event_id)).await);
        report.merge(delete(&self.events, &keys::event_detail(event_id)).await);
        log_report("coordination", event_id, report);
        report
    }

    /// Empties every namespace.
    pub async fn everything(&self) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        for cache in [
            &self.events,
            &self.users,
            &self.images,
            &self.videos,
            &self.documents,
            &self.coordination,
            &self.api,
        ] {
            report.merge(clear_prefix(cache, "").await);
        }
        log_report("all", "*", report);
        report
    }

    /// Without a known event, every per-event listing of that media kind
    /// may be stale.
    async fn media_changed(
        &self,
        media: &NamespaceCache,
        id: &str,
        event_id: Option<&str>,
    ) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        report.merge(delete(media, &keys::media_item(id)).await);
        match event_id {
            Some(event_id) => {
                report.merge(delete(media, &keys::event_media(event_id)).await);
                report.merge(delete(&self.events, &keys::event_detail(event_id)).await);
            }
            None => report.merge(clear_prefix(media, &keys::event_media("")).await),
        }
        log_report(media.namespace().name(), id, report);
        report
    }
}

async fn delete(cache: &NamespaceCache, key: &str) -> InvalidationReport {
    match cache.try_delete(key).await {
        Ok(existed) => InvalidationReport {
            removed: usize::from(existed),
            failed: 0,
        },
        Err(err) => {
            warn!(namespace = %cache.namespace(), key, error = %err, "Cache invalidation failed");
            InvalidationReport {
                removed: 0,
                failed: 1,
            }
        }
    }
}

async fn clear_prefix(cache: &NamespaceCache, prefix: &str) -> InvalidationReport {
    match cache.try_clear_prefix(prefix).await {
        Ok(removed) => InvalidationReport { removed, failed: 0 },
        Err(err) => {
            warn!(namespace = %cache.namespace(), prefix, error = %err, "Cache invalidation failed");
            InvalidationReport {
                removed: 0,
                failed: 1,
            }
        }
    }
}

fn log_report(entity: &str, id: &str, report: InvalidationReport) {
    debug!(
        entity,
        id,
        removed = report.removed,
        failed = report.failed,
        "Invalidated cache entries"
    );
}
