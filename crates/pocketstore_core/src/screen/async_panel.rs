//! Async scalar panel bound to one key of an [`AsyncKvStore`].
//!
//! # Invariants
//! - The displayed value changes only after a successful read or write.
//! - `render` re-reads the store first, so the view is never stale.

use super::view::ScalarPanelView;
use super::PanelError;
use crate::kv::AsyncKvStore;
use log::warn;
use std::sync::Arc;

/// Key the screen binds the async panel to.
pub const ASYNC_STORAGE_KEY: &str = "@storage_key";

const TITLE: &str = "Async Storage";
const ACTION_LABEL: &str = "Update Async Storage value";

pub struct AsyncScalarPanel {
    store: Arc<dyn AsyncKvStore>,
    key: String,
    displayed: Option<String>,
    notice: Option<PanelError>,
}

impl AsyncScalarPanel {
    pub fn new(store: Arc<dyn AsyncKvStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            displayed: None,
            notice: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last known value; `None` before the first successful read or write.
    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn notice(&self) -> Option<String> {
        self.notice.as_ref().map(PanelError::to_string)
    }

    /// Reads the bound key.
    ///
    /// On failure the last known value is kept and an inline notice is set;
    /// the returned `ReadFailure` is informational.
    pub async fn refresh(&mut self) -> Result<(), PanelError> {
        match self.store.get(&self.key).await {
            Ok(value) => {
                self.displayed = value;
                if matches!(self.notice, Some(PanelError::ReadFailure(_))) {
                    self.notice = None;
                }
                Ok(())
            }
            Err(err) => {
                warn!("event=async_panel_read module=screen status=error error={err}");
                let error = PanelError::ReadFailure(err.to_string());
                self.notice = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Stores `value`; on success the panel displays exactly `value`.
    pub async fn write(&mut self, value: impl Into<String>) -> Result<(), PanelError> {
        let value = value.into();
        match self.store.set(&self.key, &value).await {
            Ok(()) => {
                self.displayed = Some(value);
                self.notice = None;
                Ok(())
            }
            Err(err) => {
                warn!("event=async_panel_write module=screen status=error error={err}");
                let error = PanelError::WriteFailure(err.to_string());
                self.notice = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Re-reads the store, then builds the view.
    pub async fn render(&mut self) -> ScalarPanelView {
        // A read failure is kept as the inline notice.
        let _ = self.refresh().await;
        self.view()
    }

    /// Builds the view from the last known value without reading.
    pub fn view(&self) -> ScalarPanelView {
        ScalarPanelView::new(TITLE, self.displayed.clone(), ACTION_LABEL, self.notice())
    }
}

#[cfg(test)]
mod tests {
    use super::{AsyncScalarPanel, ASYNC_STORAGE_KEY};
    use crate::kv::{AsyncKvStore, KvError, KvResult, MemoryAsyncKv};
    use crate::screen::PanelError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Wraps a memory store and fails every call while `broken` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryAsyncKv,
        broken: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> KvResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(KvError::Worker("disk unplugged".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AsyncKvStore for FlakyStore {
        async fn get(&self, key: &str) -> KvResult<Option<String>> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> KvResult<()> {
            self.check()?;
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> KvResult<()> {
            self.check()?;
            self.inner.remove(key).await
        }
        async fn all_keys(&self) -> KvResult<Vec<String>> {
            self.check()?;
            self.inner.all_keys().await
        }
        async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
            self.check()?;
            self.inner.multi_set(entries).await
        }
        async fn clear(&self) -> KvResult<()> {
            self.check()?;
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_value_and_reports() {
        let store = Arc::new(FlakyStore::default());
        let mut panel = AsyncScalarPanel::new(store.clone(), ASYNC_STORAGE_KEY);
        panel.write("first").await.unwrap();

        store.broken.store(true, Ordering::SeqCst);
        let err = panel.write("second").await.unwrap_err();
        assert!(matches!(err, PanelError::WriteFailure(_)));
        assert_eq!(panel.displayed(), Some("first"));
        assert!(panel.notice().unwrap().contains("disk unplugged"));
    }

    #[tokio::test]
    async fn failed_read_keeps_last_known_value() {
        let store = Arc::new(FlakyStore::default());
        let mut panel = AsyncScalarPanel::new(store.clone(), ASYNC_STORAGE_KEY);
        panel.write("kept").await.unwrap();

        store.broken.store(true, Ordering::SeqCst);
        let view = panel.render().await;
        assert_eq!(view.value.as_deref(), Some("kept"));
        assert!(view.notice.is_some());
    }

    #[tokio::test]
    async fn first_load_failure_shows_absent() {
        let store = Arc::new(FlakyStore::default());
        store.broken.store(true, Ordering::SeqCst);
        let mut panel = AsyncScalarPanel::new(store, ASYNC_STORAGE_KEY);

        let view = panel.render().await;
        assert_eq!(view.value, None);
        assert_eq!(view.label, "Async Storage, Current value: ");
    }
}
