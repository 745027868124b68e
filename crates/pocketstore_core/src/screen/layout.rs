//! Store bootstrap and screen composition.
//!
//! # Responsibility
//! - Open each store once and hand the handles to panels.
//! - Route UI actions to the single panel that owns the target store.
//!
//! # Invariants
//! - Stores open independently; one failure never blocks the others.
//! - The observable panel is mounted for as long as the screen lives.

use super::async_panel::{AsyncScalarPanel, ASYNC_STORAGE_KEY};
use super::cache_panel::{ObservableScalarPanel, CACHE_KEY};
use super::record_panel::RecordListPanel;
use super::view::{PanelView, ScreenView};
use super::{random_value, PanelError};
use crate::config::AppConfig;
use crate::kv::{AsyncKvStore, KvCache, MemoryAsyncKv, SqliteAsyncKv};
use crate::model::record::{Record, RecordId};
use crate::object::{ObjectStore, StoredObject};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

const SCREEN_TITLE: &str = "Now on Expo";
const ASYNC_PANEL_TITLE: &str = "Async Storage";
const CACHE_PANEL_TITLE: &str = "MMKV";
const RECORD_PANEL_TITLE: &str = "Realm";

/// A store handle, or the reason it could not be opened.
pub type Opened<T> = Result<Arc<T>, String>;

/// Process-scoped store handles.
#[derive(Clone)]
pub struct Stores {
    pub async_store: Opened<dyn AsyncKvStore>,
    pub cache: Opened<KvCache>,
    pub objects: Opened<ObjectStore>,
}

impl Stores {
    /// Opens every store described by `config`.
    ///
    /// In-memory when `config.data_dir` is `None`. Failures are logged and
    /// kept per store.
    pub fn open(config: &AppConfig) -> Self {
        if let Some(dir) = config.data_dir.as_deref() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                error!(
                    "event=stores_open module=screen status=error error_code=data_dir_create_failed error={err}"
                );
            }
        }

        let async_store = match config.async_store_path() {
            Some(path) => SqliteAsyncKv::open(path)
                .map(|store| Arc::new(store) as Arc<dyn AsyncKvStore>)
                .map_err(|err| err.to_string()),
            None => Ok(Arc::new(MemoryAsyncKv::new()) as Arc<dyn AsyncKvStore>),
        };
        let cache = match config.cache_path() {
            Some(path) => KvCache::open(path).map(Arc::new).map_err(|err| err.to_string()),
            None => Ok(Arc::new(KvCache::in_memory())),
        };
        let objects = open_object_store(config.object_store_path().as_deref());

        let stores = Self {
            async_store,
            cache,
            objects,
        };
        stores.log_status();
        stores
    }

    fn log_status(&self) {
        for (name, outcome) in [
            ("async_store", self.async_store.as_ref().err()),
            ("cache", self.cache.as_ref().err()),
            ("objects", self.objects.as_ref().err()),
        ] {
            match outcome {
                None => info!("event=store_open module=screen status=ok store={name}"),
                Some(err) => error!(
                    "event=store_open module=screen status=error store={name} error={err}"
                ),
            }
        }
    }
}

fn open_object_store(path: Option<&Path>) -> Opened<ObjectStore> {
    let schemas = vec![Record::schema()];
    let store = match path {
        Some(path) => ObjectStore::open(path, schemas),
        None => ObjectStore::open_in_memory(schemas),
    };
    store.map(Arc::new).map_err(|err| err.to_string())
}

/// A panel, or the reason its store is unavailable.
pub enum PanelSlot<P> {
    Ready(P),
    Unavailable(String),
}

impl<P> PanelSlot<P> {
    pub fn ready(&self) -> Option<&P> {
        match self {
            Self::Ready(panel) => Some(panel),
            Self::Unavailable(_) => None,
        }
    }

    pub fn ready_mut(&mut self) -> Result<&mut P, PanelError> {
        match self {
            Self::Ready(panel) => Ok(panel),
            Self::Unavailable(reason) => Err(PanelError::StorageUnavailable(reason.clone())),
        }
    }

    fn view<V>(&self, title: &str, render: impl FnOnce(&P) -> V) -> PanelView<V> {
        match self {
            Self::Ready(panel) => PanelView::Ready(render(panel)),
            Self::Unavailable(reason) => PanelView::Unavailable {
                title: title.to_string(),
                reason: reason.clone(),
            },
        }
    }
}

/// A button press on the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenAction {
    UpdateAsyncValue(String),
    UpdateCacheValue(String),
    AddRecord(String),
    DeleteRecord(RecordId),
}

impl ScreenAction {
    /// The async panel's button: writes a random token.
    pub fn update_async_random() -> Self {
        Self::UpdateAsyncValue(random_value())
    }

    pub fn update_cache_random() -> Self {
        Self::UpdateCacheValue(random_value())
    }

    pub fn add_random_record() -> Self {
        Self::AddRecord(random_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Written,
    Created(RecordId),
    Deleted,
    /// Delete of an id that is not in the store.
    NotFound,
}

/// The composed screen.
pub struct Screen {
    async_panel: PanelSlot<AsyncScalarPanel>,
    cache_panel: PanelSlot<ObservableScalarPanel>,
    record_panel: PanelSlot<RecordListPanel>,
}

impl Screen {
    /// Builds every panel from `stores` and mounts the observable panel.
    pub fn compose(stores: &Stores) -> Self {
        let async_panel = match &stores.async_store {
            Ok(store) => PanelSlot::Ready(AsyncScalarPanel::new(
                Arc::clone(store),
                ASYNC_STORAGE_KEY,
            )),
            Err(reason) => PanelSlot::Unavailable(reason.clone()),
        };

        let cache_panel = match &stores.cache {
            Ok(cache) => {
                let mut panel = ObservableScalarPanel::new(Arc::clone(cache), CACHE_KEY);
                match panel.mount() {
                    Ok(()) => PanelSlot::Ready(panel),
                    Err(err) => PanelSlot::Unavailable(err.to_string()),
                }
            }
            Err(reason) => PanelSlot::Unavailable(reason.clone()),
        };

        let record_panel = match &stores.objects {
            Ok(store) => match RecordListPanel::new(Arc::clone(store)) {
                Ok(panel) => PanelSlot::Ready(panel),
                Err(err) => PanelSlot::Unavailable(err.to_string()),
            },
            Err(reason) => PanelSlot::Unavailable(reason.clone()),
        };

        Self {
            async_panel,
            cache_panel,
            record_panel,
        }
    }

    pub fn async_panel(&self) -> Option<&AsyncScalarPanel> {
        self.async_panel.ready()
    }

    pub fn cache_panel(&self) -> Option<&ObservableScalarPanel> {
        self.cache_panel.ready()
    }

    pub fn record_panel(&self) -> Option<&RecordListPanel> {
        self.record_panel.ready()
    }

    /// Applies one action to the panel that owns its store.
    ///
    /// # Errors
    /// - `StorageUnavailable` when that panel's store failed to open.
    /// - `WriteFailure` when the write was rejected; panel state is unchanged.
    pub async fn dispatch(&mut self, action: ScreenAction) -> Result<ActionOutcome, PanelError> {
        match action {
            ScreenAction::UpdateAsyncValue(value) => {
                self.async_panel.ready_mut()?.write(value).await?;
                Ok(ActionOutcome::Written)
            }
            ScreenAction::UpdateCacheValue(value) => {
                self.cache_panel.ready_mut()?.write(&value)?;
                Ok(ActionOutcome::Written)
            }
            ScreenAction::AddRecord(value) => {
                let id = self.record_panel.ready_mut()?.create(value)?;
                Ok(ActionOutcome::Created(id))
            }
            ScreenAction::DeleteRecord(id) => {
                if self.record_panel.ready_mut()?.delete(id)? {
                    Ok(ActionOutcome::Deleted)
                } else {
                    Ok(ActionOutcome::NotFound)
                }
            }
        }
    }

    /// One render pass; the async panel re-reads its store first.
    pub async fn render(&mut self) -> ScreenView {
        let async_panel = match &mut self.async_panel {
            PanelSlot::Ready(panel) => PanelView::Ready(panel.render().await),
            PanelSlot::Unavailable(reason) => PanelView::Unavailable {
                title: ASYNC_PANEL_TITLE.to_string(),
                reason: reason.clone(),
            },
        };

        ScreenView {
            title: SCREEN_TITLE.to_string(),
            async_panel,
            cache_panel: self
                .cache_panel
                .view(CACHE_PANEL_TITLE, ObservableScalarPanel::render),
            record_panel: self
                .record_panel
                .view(RECORD_PANEL_TITLE, RecordListPanel::render),
        }
    }
}
