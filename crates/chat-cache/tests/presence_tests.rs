//! Redis presence store tests
//!
//! Skipped unless REDIS_URL points at a running server.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chat_cache::{create_pool, RedisPresenceStore};
use chat_common::{PoolSettings, RedisConfig};
use chat_core::traits::PresenceStore;

async fn get_store() -> Option<RedisPresenceStore> {
    let url = std::env::var("REDIS_URL").ok()?;
    let config = RedisConfig { url, pool_size: 2 };
    let pool = create_pool(&config, &PoolSettings::default()).await.ok()?;
    Some(RedisPresenceStore::new(Arc::new(pool)))
}

fn unique_uid() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_online_entry_lifecycle() {
    let Some(store) = get_store().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let uid = unique_uid();

    store.set_online_user_info(uid, "node-a").await.unwrap();
    assert_eq!(
        store.get_online_user_info(uid).await.unwrap().as_deref(),
        Some("node-a")
    );

    assert!(!store.del_online_user_info_if(uid, "node-b").await.unwrap());
    assert!(store.del_online_user_info_if(uid, "node-a").await.unwrap());
    assert!(store.get_online_user_info(uid).await.unwrap().is_none());

    store.set_online_user_info(uid, "node-a").await.unwrap();
    store.del_online_user_info(uid).await.unwrap();
    assert!(store.get_online_user_info(uid).await.unwrap().is_none());
}

#[tokio::test]
async fn test_msg_id_set_once() {
    let Some(store) = get_store().await else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let uid = unique_uid();
    let ttl = Duration::from_secs(10);

    assert!(!store.get_user_msg_id(uid, 1).await.unwrap());
    assert!(store.set_user_msg_id(uid, 1, ttl).await.unwrap());
    assert!(!store.set_user_msg_id(uid, 1, ttl).await.unwrap());
    assert!(store.get_user_msg_id(uid, 1).await.unwrap());
    assert!(store.expire_user_msg_id(uid, 1, ttl).await.unwrap());
    assert!(!store.expire_user_msg_id(uid, 2, ttl).await.unwrap());

    assert!(store.del_user_msg_id(uid, 1).await.unwrap());
    assert!(store.set_user_msg_id(uid, 1, ttl).await.unwrap());
}
