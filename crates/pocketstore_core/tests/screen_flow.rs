use pocketstore_core::kv::{AsyncKvStore, KvCache, MemoryAsyncKv};
use pocketstore_core::screen::{
    AsyncScalarPanel, ObservableScalarPanel, PanelView, ASYNC_STORAGE_KEY, CACHE_KEY,
};
use pocketstore_core::{
    ActionOutcome, AppConfig, PanelError, Record, Screen, ScreenAction, Stores,
};
use std::sync::Arc;

fn record_values(screen: &Screen) -> Vec<String> {
    screen
        .record_panel()
        .unwrap()
        .list()
        .into_iter()
        .map(|record| record.value)
        .collect()
}

#[tokio::test]
async fn record_scenario_create_create_delete() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);
    assert!(record_values(&screen).is_empty());

    let abc = match screen
        .dispatch(ScreenAction::AddRecord("abc".to_string()))
        .await
        .unwrap()
    {
        ActionOutcome::Created(id) => id,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(record_values(&screen), vec!["abc"]);

    screen
        .dispatch(ScreenAction::AddRecord("xyz".to_string()))
        .await
        .unwrap();
    assert_eq!(record_values(&screen).len(), 2);

    let outcome = screen
        .dispatch(ScreenAction::DeleteRecord(abc))
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Deleted);
    assert_eq!(record_values(&screen), vec!["xyz"]);
}

#[tokio::test]
async fn duplicate_values_create_distinct_records() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);

    for _ in 0..2 {
        screen
            .dispatch(ScreenAction::AddRecord("same".to_string()))
            .await
            .unwrap();
    }

    let records: Vec<Record> = screen.record_panel().unwrap().list();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].id, records[1].id);
}

#[tokio::test]
async fn deleting_unknown_id_leaves_list_unchanged() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);
    screen
        .dispatch(ScreenAction::add_random_record())
        .await
        .unwrap();
    let before = screen.record_panel().unwrap().list();

    let outcome = screen
        .dispatch(ScreenAction::DeleteRecord(uuid::Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::NotFound);
    assert_eq!(screen.record_panel().unwrap().list(), before);
}

#[tokio::test]
async fn async_value_survives_panel_reload() {
    let store: Arc<dyn AsyncKvStore> = Arc::new(MemoryAsyncKv::new());

    let mut panel = AsyncScalarPanel::new(Arc::clone(&store), ASYNC_STORAGE_KEY);
    panel.write("hello").await.unwrap();
    drop(panel);

    let mut reloaded = AsyncScalarPanel::new(store, ASYNC_STORAGE_KEY);
    assert_eq!(reloaded.displayed(), None);
    let view = reloaded.render().await;
    assert_eq!(view.value.as_deref(), Some("hello"));
    assert_eq!(view.label, "Async Storage, Current value: hello");
}

#[tokio::test]
async fn async_panel_render_picks_up_external_writes() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);
    let store = stores.async_store.clone().unwrap();

    store.set(ASYNC_STORAGE_KEY, "from elsewhere").await.unwrap();
    let view = screen.render().await;
    assert_eq!(
        view.async_panel.ready().unwrap().value.as_deref(),
        Some("from elsewhere")
    );
}

#[test]
fn observable_panel_follows_subscription_without_reads() {
    let cache = Arc::new(KvCache::in_memory());
    let mut panel = ObservableScalarPanel::new(Arc::clone(&cache), CACHE_KEY);
    panel.mount().unwrap();
    assert_eq!(panel.displayed(), None);
    let start = panel.revision();

    panel.write("a1b2c").unwrap();
    assert_eq!(panel.displayed().as_deref(), Some("a1b2c"));

    // A write from another holder of the cache reaches the panel too.
    cache.set(CACHE_KEY, "z9y8x").unwrap();
    assert_eq!(panel.render().value.as_deref(), Some("z9y8x"));
    assert_eq!(panel.revision(), start + 2);
}

#[tokio::test]
async fn panels_do_not_affect_each_other() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);

    screen
        .dispatch(ScreenAction::UpdateCacheValue("cached".to_string()))
        .await
        .unwrap();
    let view = screen.render().await;

    assert_eq!(view.async_panel.ready().unwrap().value, None);
    assert_eq!(
        view.cache_panel.ready().unwrap().value.as_deref(),
        Some("cached")
    );
    assert!(view.record_panel.ready().unwrap().rows.is_empty());
}

#[tokio::test]
async fn unavailable_store_disables_only_its_panel() {
    let mut stores = Stores::open(&AppConfig::in_memory());
    stores.objects = Err("disk full".to_string());
    let mut screen = Screen::compose(&stores);

    let err = screen
        .dispatch(ScreenAction::add_random_record())
        .await
        .unwrap_err();
    assert_eq!(err, PanelError::StorageUnavailable("disk full".to_string()));

    screen
        .dispatch(ScreenAction::update_async_random())
        .await
        .unwrap();
    let view = screen.render().await;
    assert!(view.async_panel.ready().unwrap().value.is_some());
    assert!(matches!(
        view.record_panel,
        PanelView::Unavailable { ref reason, .. } if reason == "disk full"
    ));
}

#[tokio::test]
async fn file_backed_screen_restores_all_panels() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::with_data_dir(dir.path().join("data"));

    {
        let stores = Stores::open(&config);
        let mut screen = Screen::compose(&stores);
        for action in [
            ScreenAction::UpdateAsyncValue("async-v".to_string()),
            ScreenAction::UpdateCacheValue("cache-v".to_string()),
            ScreenAction::AddRecord("record-v".to_string()),
        ] {
            screen.dispatch(action).await.unwrap();
        }
    }

    let stores = Stores::open(&config);
    let mut screen = Screen::compose(&stores);
    let view = screen.render().await;
    assert_eq!(
        view.async_panel.ready().unwrap().value.as_deref(),
        Some("async-v")
    );
    assert_eq!(
        view.cache_panel.ready().unwrap().value.as_deref(),
        Some("cache-v")
    );
    let rows = &view.record_panel.ready().unwrap().rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, "record-v");
}

#[tokio::test]
async fn screen_view_serializes_for_the_ui_layer() {
    let stores = Stores::open(&AppConfig::in_memory());
    let mut screen = Screen::compose(&stores);
    screen
        .dispatch(ScreenAction::AddRecord("abc".to_string()))
        .await
        .unwrap();

    let json = serde_json::to_value(screen.render().await).unwrap();
    assert_eq!(json["title"], "Now on Expo");
    assert_eq!(json["record_panel"]["state"], "ready");
    assert_eq!(json["record_panel"]["rows"][0]["value"], "abc");
}
