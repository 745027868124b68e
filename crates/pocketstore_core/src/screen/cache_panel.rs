//! Observable scalar panel bound to one key of the [`KvCache`].
//!
//! # Invariants
//! - The display is fed only by the cache subscription (plus the seed read
//!   on mount); `write` never assigns it.
//! - On each delivery the display converges to the cache's current value.
//! - The subscription lives between `mount` and `unmount` (or drop).

use super::view::ScalarPanelView;
use super::PanelError;
use crate::kv::{KvCache, SubscriptionToken};
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Key the screen binds the observable panel to.
pub const CACHE_KEY: &str = "@MMKV";

const TITLE: &str = "MMKV";
const ACTION_LABEL: &str = "Update MMKV value";

pub struct ObservableScalarPanel {
    cache: Arc<KvCache>,
    key: String,
    display: Arc<RwLock<Option<String>>>,
    revision: Arc<AtomicU64>,
    token: Option<SubscriptionToken>,
    notice: Option<PanelError>,
}

impl ObservableScalarPanel {
    /// Creates an unmounted panel; call [`mount`](Self::mount) to start
    /// receiving values.
    pub fn new(cache: Arc<KvCache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
            display: Arc::new(RwLock::new(None)),
            revision: Arc::new(AtomicU64::new(0)),
            token: None,
            notice: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.token.is_some()
    }

    /// Subscribes to the bound key and seeds the display with its current
    /// value. Mounting twice is a no-op.
    pub fn mount(&mut self) -> Result<(), PanelError> {
        if self.token.is_some() {
            return Ok(());
        }

        let (display, revision) = (Arc::clone(&self.display), Arc::clone(&self.revision));
        // Deliveries from concurrent writers may arrive out of order, so the
        // display takes the cache's current value, not the delivered one.
        let cache = Arc::downgrade(&self.cache);
        let token = self
            .cache
            .subscribe(&self.key, move |key, delivered| {
                let current = match cache.upgrade().map(|cache| cache.get(key)) {
                    Some(Ok(current)) => current,
                    _ => delivered.map(str::to_string),
                };
                *display.write().unwrap_or_else(PoisonError::into_inner) = current;
                revision.fetch_add(1, Ordering::SeqCst);
            })
            .map_err(|err| PanelError::StorageUnavailable(err.to_string()))?;
        self.token = Some(token);

        let current = self
            .cache
            .get(&self.key)
            .map_err(|err| PanelError::ReadFailure(err.to_string()))?;
        *self.display.write().unwrap_or_else(PoisonError::into_inner) = current;
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Drops the subscription; the display keeps its last value.
    pub fn unmount(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if let Err(err) = self.cache.unsubscribe(token) {
            warn!("event=cache_panel_unmount module=screen status=error error={err}");
        }
    }

    /// Writes `value` to the cache; the display follows via the subscription.
    pub fn write(&mut self, value: &str) -> Result<(), PanelError> {
        match self.cache.set(&self.key, value) {
            Ok(()) => {
                self.notice = None;
                Ok(())
            }
            Err(err) => {
                warn!("event=cache_panel_write module=screen status=error error={err}");
                let error = PanelError::WriteFailure(err.to_string());
                self.notice = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn displayed(&self) -> Option<String> {
        self.display
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bumped on every delivered value; a UI re-renders when it changes.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn render(&self) -> ScalarPanelView {
        ScalarPanelView::new(
            TITLE,
            self.displayed(),
            ACTION_LABEL,
            self.notice.as_ref().map(PanelError::to_string),
        )
    }
}

impl Drop for ObservableScalarPanel {
    fn drop(&mut self) {
        self.unmount();
    }
}
