//! Render model handed to the UI layer.

use crate::model::record::RecordId;
use serde::Serialize;

/// Whole screen, one entry per panel in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenView {
    pub title: String,
    pub async_panel: PanelView<ScalarPanelView>,
    pub cache_panel: PanelView<ScalarPanelView>,
    pub record_panel: PanelView<RecordPanelView>,
}

/// A panel is either drawable or replaced by the reason its store is down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelView<V> {
    Ready(V),
    Unavailable { title: String, reason: String },
}

impl<V> PanelView<V> {
    pub fn ready(&self) -> Option<&V> {
        match self {
            Self::Ready(view) => Some(view),
            Self::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarPanelView {
    pub title: String,
    /// `"<title>, Current value: <value>"`, empty value when absent.
    pub label: String,
    pub value: Option<String>,
    pub action_label: String,
    /// Inline failure message from the last operation, if any.
    pub notice: Option<String>,
}

impl ScalarPanelView {
    pub(crate) fn new(
        title: &str,
        value: Option<String>,
        action_label: &str,
        notice: Option<String>,
    ) -> Self {
        Self {
            title: title.to_string(),
            label: format!("{title}, Current value: {}", value.as_deref().unwrap_or("")),
            value,
            action_label: action_label.to_string(),
            notice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPanelView {
    pub title: String,
    pub rows: Vec<RecordRow>,
    pub action_label: String,
    pub notice: Option<String>,
}

/// One list row: the value plus a delete affordance bound to `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRow {
    pub id: RecordId,
    pub value: String,
    pub delete_label: String,
}
