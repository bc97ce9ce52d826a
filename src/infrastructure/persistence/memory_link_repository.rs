//! In-process link store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;

use crate::domain::entities::{Link, LinkPatch, LinkStatus, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::clock::{SharedClock, SystemClock};

#[derive(Default)]
struct Inner {
    links: HashMap<u64, Link>,
    by_code: HashMap<String, u64>,
}

/// Link store backed by two maps under one lock.
///
/// Used when `STORAGE_BACKEND=memory` and by integration tests. Contents are
/// lost on restart. Timestamps come from the injected clock.
pub struct MemoryLinkRepository {
    inner: RwLock<Inner>,
    clock: SharedClock,
}

impl Default for MemoryLinkRepository {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryLinkRepository {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkRepository {
    async fn find_by_short_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        let inner = self.inner.read();
        Ok(inner
            .by_code
            .get(code)
            .and_then(|id| inner.links.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Link>, AppError> {
        Ok(self.inner.read().links.get(&id).cloned())
    }

    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let mut inner = self.inner.write();

        if inner.by_code.contains_key(&new_link.short_code) {
            return Err(AppError::conflict(
                "Short code already exists",
                json!({ "short_code": new_link.short_code }),
            ));
        }
        if inner.links.contains_key(&new_link.id) {
            return Err(AppError::conflict(
                "Link id already exists",
                json!({ "id": new_link.id.to_string() }),
            ));
        }

        let mut link = Link::new(new_link.id, new_link.short_code, new_link.target, self.clock.now_utc());
        link.expires_at = new_link.expires_at;

        inner.by_code.insert(link.short_code.clone(), link.id);
        inner.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn update(&self, id: u64, patch: LinkPatch) -> Result<Link, AppError> {
        let mut inner = self.inner.write();
        let link = inner
            .links
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Link not found"))?;

        if let Some(target) = patch.target {
            link.target = target;
        }
        if let Some(status) = patch.status {
            link.status = status;
        }
        if let Some(expires_at) = patch.expires_at {
            link.expires_at = expires_at;
        }
        link.updated_at = self.clock.now_utc();

        Ok(link.clone())
    }

    async fn soft_delete(&self, id: u64) -> Result<bool, AppError> {
        let mut inner = self.inner.write();
        match inner.links.get_mut(&id) {
            Some(link) if !link.is_deleted() => {
                link.status = LinkStatus::Deleted;
                link.updated_at = self.clock.now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_click_count(&self, id: u64) -> Result<(), AppError> {
        if let Some(link) = self.inner.write().links.get_mut(&id) {
            link.click_count += 1;
        }
        Ok(())
    }
}
