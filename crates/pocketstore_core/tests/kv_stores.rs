use pocketstore_core::kv::{AsyncKvStore, KvCache, SqliteAsyncKv};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn async_store_round_trips_arbitrary_strings() {
    let store = SqliteAsyncKv::open_in_memory().unwrap();
    for value in ["", "a1b2c", "with spaces", "ünïcödé ✓", "line\nbreak"] {
        store.set("@storage_key", value).await.unwrap();
        assert_eq!(
            store.get("@storage_key").await.unwrap().as_deref(),
            Some(value)
        );
    }
}

#[tokio::test]
async fn async_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async_store.sqlite3");

    SqliteAsyncKv::open(&path)
        .unwrap()
        .set("@storage_key", "hello")
        .await
        .unwrap();

    let reopened = SqliteAsyncKv::open(&path).unwrap();
    assert_eq!(
        reopened.get("@storage_key").await.unwrap().as_deref(),
        Some("hello")
    );
}

#[tokio::test]
async fn async_store_remove_and_clear() {
    let store = SqliteAsyncKv::open_in_memory().unwrap();
    store.set("a", "1").await.unwrap();
    store.set("b", "2").await.unwrap();

    store.remove("a").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);
    assert_eq!(store.all_keys().await.unwrap(), vec!["b".to_string()]);

    store.clear().await.unwrap();
    assert!(store.all_keys().await.unwrap().is_empty());
}

#[test]
fn cache_write_through_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv_cache.sqlite3");

    {
        let cache = KvCache::open(&path).unwrap();
        cache.set("@MMKV", "x1y2z").unwrap();
        cache.set("gone", "soon").unwrap();
        assert!(cache.delete("gone").unwrap());
    }

    let cache = KvCache::open(&path).unwrap();
    assert_eq!(cache.get("@MMKV").unwrap().as_deref(), Some("x1y2z"));
    assert!(!cache.contains("gone").unwrap());
    assert_eq!(cache.keys().unwrap(), vec!["@MMKV".to_string()]);
}

#[test]
fn cache_clear_all_notifies_each_key() {
    let cache = KvCache::in_memory();
    cache.set("a", "1").unwrap();
    cache.set("b", "2").unwrap();

    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&removed);
    let token = cache
        .add_listener(move |key, value| {
            assert!(value.is_none());
            sink.lock().unwrap().push(key.to_string());
        })
        .unwrap();

    cache.clear_all().unwrap();
    let mut keys = removed.lock().unwrap().clone();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    assert!(cache.unsubscribe(token).unwrap());
    assert!(!cache.unsubscribe(token).unwrap());
}
