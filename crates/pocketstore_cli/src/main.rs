//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `pocketstore_core` linkage without the Flutter/FFI runtime.
//! - Press every screen button once and print the rendered screen as JSON.
//!
//! Stores live in memory unless `POCKETSTORE_DATA_DIR` is set. A failed
//! action is reported on stderr and the screen is still rendered.

use pocketstore_core::{ActionOutcome, AppConfig, Screen, ScreenAction, ScreenView, Stores};
use std::error::Error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("pocketstore_core ping={}", pocketstore_core::ping());
    println!("pocketstore_core version={}", pocketstore_core::core_version());

    let stores = Stores::open(&AppConfig::from_env());
    let view = run_demo(&stores).await;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn run_demo(stores: &Stores) -> ScreenView {
    let mut screen = Screen::compose(stores);

    press(&mut screen, ScreenAction::update_async_random()).await;
    press(&mut screen, ScreenAction::update_cache_random()).await;
    let first = press(&mut screen, ScreenAction::AddRecord("abc".to_string())).await;
    press(&mut screen, ScreenAction::AddRecord("xyz".to_string())).await;
    if let Some(ActionOutcome::Created(id)) = first {
        press(&mut screen, ScreenAction::DeleteRecord(id)).await;
    }

    screen.render().await
}

async fn press(screen: &mut Screen, action: ScreenAction) -> Option<ActionOutcome> {
    let label = format!("{action:?}");
    match screen.dispatch(action).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            eprintln!("pocketstore_cli action={label} error={err}");
            None
        }
    }
}
