//! Headless screen model: three storage panels and their composition.
//!
//! # Responsibility
//! - Turn button presses into writes against exactly one collaborator.
//! - Produce a plain render model that a UI layer draws.
//!
//! # Invariants
//! - Panels never talk to each other.
//! - A failed write leaves the panel's displayed state unchanged and is
//!   reported to the caller and as an inline notice.
//! - A store that failed to open disables only its own panel.

use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod async_panel;
mod cache_panel;
mod layout;
mod record_panel;
mod view;

pub use async_panel::{AsyncScalarPanel, ASYNC_STORAGE_KEY};
pub use cache_panel::{ObservableScalarPanel, CACHE_KEY};
pub use layout::{ActionOutcome, Opened, PanelSlot, Screen, ScreenAction, Stores};
pub use record_panel::RecordListPanel;
pub use view::{PanelView, RecordPanelView, RecordRow, ScalarPanelView, ScreenView};

const RANDOM_VALUE_LEN: usize = 5;
const RANDOM_VALUE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Failure reported by a panel action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// The panel's store could not be opened.
    StorageUnavailable(String),
    ReadFailure(String),
    WriteFailure(String),
}

impl Display for PanelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(reason) => write!(f, "storage unavailable: {reason}"),
            Self::ReadFailure(reason) => write!(f, "read failed: {reason}"),
            Self::WriteFailure(reason) => write!(f, "write failed: {reason}"),
        }
    }
}

impl Error for PanelError {}

/// Short lowercase base-36 token used by the screen's update buttons.
pub fn random_value() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_VALUE_LEN)
        .map(|_| RANDOM_VALUE_ALPHABET[rng.gen_range(0..RANDOM_VALUE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::random_value;

    #[test]
    fn random_value_is_five_base36_chars() {
        let value = random_value();
        assert_eq!(value.len(), 5);
        assert!(value
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
