//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the storage screen to Dart via FRB: one render call plus one
//!   call per button.
//! - Own the process-scoped screen built by `init_app`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every call other than `ping`, `core_version`, `init_logging` and
//!   `init_app` fails softly until `init_app` succeeded.
//! - The screen is composed once per process; later `init_app` calls with the
//!   same data directory are no-ops.

use log::{info, warn};
use pocketstore_core::screen::{
    PanelView, RecordPanelView, ScalarPanelView, ScreenView as CoreScreenView,
};
use pocketstore_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ActionOutcome, AppConfig, PanelError, Screen, ScreenAction, Stores,
};
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::sync::Mutex;
use uuid::Uuid;

static APP: OnceLock<AppState> = OnceLock::new();

struct AppState {
    data_dir: Option<PathBuf>,
    screen: Mutex<Screen>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Opens the three stores and composes the screen.
///
/// Input semantics:
/// - `data_dir`: directory holding the store files. Blank falls back to
///   `POCKETSTORE_DATA_DIR`, then to in-memory stores.
///
/// # FFI contract
/// - Sync call; opens SQLite files.
/// - A store that fails to open only disables its own panel.
/// - Returns empty string on success, error message when the screen was
///   already composed for another directory.
#[flutter_rust_bridge::frb(sync)]
pub fn init_app(data_dir: String) -> String {
    let config = resolve_config(&data_dir);
    let state = APP.get_or_init(|| {
        let stores = Stores::open(&config);
        info!(
            "event=app_init module=ffi status=ok persistent={}",
            config.data_dir.is_some()
        );
        AppState {
            data_dir: config.data_dir.clone(),
            screen: Mutex::new(Screen::compose(&stores)),
        }
    });

    if state.data_dir == config.data_dir {
        String::new()
    } else {
        warn!("event=app_init module=ffi status=error error_code=already_initialized");
        format!(
            "init_app rejected: already initialized with data_dir={}",
            describe_dir(state.data_dir.as_ref())
        )
    }
}

/// One scalar panel as drawn by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarPanelState {
    pub available: bool,
    pub title: String,
    /// `"<title>, Current value: <value>"`, or the unavailability reason.
    pub label: String,
    pub value: Option<String>,
    pub action_label: String,
    pub notice: Option<String>,
}

/// One row of the record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordItem {
    pub id: String,
    pub value: String,
    pub delete_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPanelState {
    pub available: bool,
    pub title: String,
    pub rows: Vec<RecordItem>,
    pub action_label: String,
    pub notice: Option<String>,
}

/// Render envelope for the whole screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenState {
    pub title: String,
    pub async_panel: ScalarPanelState,
    pub cache_panel: ScalarPanelState,
    pub record_panel: RecordPanelState,
}

/// Result of one button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether the write was applied.
    pub ok: bool,
    /// Created record ID for `record_add`.
    pub record_id: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            ok: true,
            record_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            message: message.into(),
        }
    }
}

/// Renders the screen. The async panel re-reads its store first.
///
/// # FFI contract
/// - Async call.
/// - Never panics; returns `Err` message only before `init_app`.
pub async fn screen_render() -> Result<ScreenState, String> {
    let state = app_state()?;
    let view = state.screen.lock().await.render().await;
    Ok(to_screen_state(view))
}

/// Writes a fresh random value to the async store panel.
///
/// # FFI contract
/// - Async call.
/// - Never panics.
pub async fn async_update_value() -> ActionResponse {
    run_action("async_update_value", ScreenAction::update_async_random()).await
}

/// Writes a fresh random value to the observable cache panel.
pub async fn cache_update_value() -> ActionResponse {
    run_action("cache_update_value", ScreenAction::update_cache_random()).await
}

/// Creates one record with a random value.
pub async fn record_add() -> ActionResponse {
    run_action("record_add", ScreenAction::add_random_record()).await
}

/// Deletes the record with `id` (UUID text).
///
/// # FFI contract
/// - Async call.
/// - Malformed IDs fail without touching the store.
/// - Unknown IDs succeed with `ok=true` and leave the list unchanged.
pub async fn record_delete(id: String) -> ActionResponse {
    let parsed = match Uuid::parse_str(id.trim()) {
        Ok(parsed) => parsed,
        Err(err) => {
            return ActionResponse::failure(format!("record_delete failed: invalid id: {err}"))
        }
    };
    run_action("record_delete", ScreenAction::DeleteRecord(parsed)).await
}

async fn run_action(op: &'static str, action: ScreenAction) -> ActionResponse {
    let state = match app_state() {
        Ok(state) => state,
        Err(err) => return ActionResponse::failure(format!("{op} failed: {err}")),
    };

    let outcome = state.screen.lock().await.dispatch(action).await;
    match outcome {
        Ok(ActionOutcome::Written) => ActionResponse::success("Value updated.", None),
        Ok(ActionOutcome::Created(id)) => {
            ActionResponse::success("Record created.", Some(id.to_string()))
        }
        Ok(ActionOutcome::Deleted) => ActionResponse::success("Record deleted.", None),
        Ok(ActionOutcome::NotFound) => ActionResponse::success("Record not found.", None),
        Err(err) => {
            let code = match err {
                PanelError::StorageUnavailable(_) => "storage_unavailable",
                PanelError::ReadFailure(_) => "read_failed",
                PanelError::WriteFailure(_) => "write_failed",
            };
            warn!("event={op} module=ffi status=error error_code={code}");
            ActionResponse::failure(format!("{op} failed: {err}"))
        }
    }
}

fn app_state() -> Result<&'static AppState, String> {
    APP.get()
        .ok_or_else(|| "app not initialized; call init_app first".to_string())
}

fn resolve_config(raw: &str) -> AppConfig {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        AppConfig::from_env()
    } else {
        AppConfig::with_data_dir(trimmed)
    }
}

fn describe_dir(dir: Option<&PathBuf>) -> String {
    match dir {
        Some(dir) => dir.display().to_string(),
        None => "<memory>".to_string(),
    }
}

fn to_screen_state(view: CoreScreenView) -> ScreenState {
    ScreenState {
        title: view.title,
        async_panel: to_scalar_state(view.async_panel),
        cache_panel: to_scalar_state(view.cache_panel),
        record_panel: to_record_state(view.record_panel),
    }
}

fn to_scalar_state(view: PanelView<ScalarPanelView>) -> ScalarPanelState {
    match view {
        PanelView::Ready(panel) => ScalarPanelState {
            available: true,
            title: panel.title,
            label: panel.label,
            value: panel.value,
            action_label: panel.action_label,
            notice: panel.notice,
        },
        PanelView::Unavailable { title, reason } => ScalarPanelState {
            available: false,
            title,
            label: reason.clone(),
            value: None,
            action_label: String::new(),
            notice: Some(reason),
        },
    }
}

fn to_record_state(view: PanelView<RecordPanelView>) -> RecordPanelState {
    match view {
        PanelView::Ready(panel) => RecordPanelState {
            available: true,
            title: panel.title,
            rows: panel
                .rows
                .into_iter()
                .map(|row| RecordItem {
                    id: row.id.to_string(),
                    value: row.value,
                    delete_label: row.delete_label,
                })
                .collect(),
            action_label: panel.action_label,
            notice: panel.notice,
        },
        PanelView::Unavailable { title, reason } => RecordPanelState {
            available: false,
            title,
            rows: Vec::new(),
            action_label: String::new(),
            notice: Some(reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        async_update_value, cache_update_value, core_version, init_app, init_logging, ping,
        record_add, record_delete, screen_render,
    };

    // Tests share one process-wide screen; all of them compose it in memory.
    fn ensure_app() {
        std::env::remove_var("POCKETSTORE_DATA_DIR");
        assert_eq!(init_app(String::new()), "");
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_app_is_idempotent_and_rejects_other_dir() {
        ensure_app();
        ensure_app();
        let error = init_app("/tmp/pocketstore-other".to_string());
        assert!(error.contains("already initialized"), "{error}");
    }

    #[tokio::test]
    async fn record_add_then_delete_round_trips_through_render() {
        ensure_app();
        let created = record_add().await;
        assert!(created.ok, "{}", created.message);
        let id = created.record_id.clone().unwrap();

        let screen = screen_render().await.unwrap();
        assert!(screen.record_panel.available);
        assert!(screen.record_panel.rows.iter().any(|row| row.id == id));

        let deleted = record_delete(id.clone()).await;
        assert!(deleted.ok, "{}", deleted.message);
        assert_eq!(deleted.message, "Record deleted.");

        let screen = screen_render().await.unwrap();
        assert!(screen.record_panel.rows.iter().all(|row| row.id != id));
    }

    #[tokio::test]
    async fn record_delete_handles_unknown_and_malformed_ids() {
        ensure_app();
        let unknown = record_delete(uuid::Uuid::new_v4().to_string()).await;
        assert!(unknown.ok);
        assert_eq!(unknown.message, "Record not found.");

        let malformed = record_delete("not-a-uuid".to_string()).await;
        assert!(!malformed.ok);
        assert!(malformed.message.contains("invalid id"));
    }

    #[tokio::test]
    async fn scalar_updates_show_up_in_render() {
        ensure_app();
        assert!(async_update_value().await.ok);
        assert!(cache_update_value().await.ok);

        let screen = screen_render().await.unwrap();
        assert_eq!(screen.title, "Now on Expo");
        let async_value = screen.async_panel.value.unwrap();
        assert_eq!(async_value.len(), 5);
        assert!(screen
            .async_panel
            .label
            .starts_with("Async Storage, Current value: "));
        assert_eq!(screen.cache_panel.value.map(|v| v.len()), Some(5));
    }
}
