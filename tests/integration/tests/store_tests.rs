//! Store-backed Node Tests
//!
//! These tests require:
//! - Running PostgreSQL instance
//! - Running Redis instance
//! - Environment variables: DATABASE_URL, REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test store_tests

use chat_common::AppConfig;
use chat_node::{MsgId, Stores};
use integration_tests::{check_store_env, TestNode};
use serde_json::json;

fn store_config(name: &str) -> AppConfig {
    let mut config = AppConfig::from_env().expect("Failed to load config");
    config.node.name = name.to_string();
    config.node.host = "127.0.0.1".to_string();
    config.node.port = 0;
    config.node.peer_port = 0;
    config.node.http_port = 0;
    config
}

/// Ids unlikely to collide with other runs against the same database
fn unique_uid(offset: u64) -> u64 {
    let millis = epoch_millis();
    millis * 10 + offset
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// PostgreSQL + Redis
// ============================================================================

#[tokio::test]
async fn test_login_persists_presence_in_redis() {
    if !check_store_env() {
        return;
    }

    let config = store_config("store-node-1");
    let (stores, pools) = Stores::connect(&config).await.expect("Failed to connect stores");
    let node = TestNode::start_with(config, stores.clone()).await.unwrap();

    let uid = unique_uid(1);
    let mut client = node.connect().await.unwrap();
    let response = client.login(uid, "store-user").await.unwrap();
    assert_eq!(response["error"], 0);

    let stored = stores.presence.get_online_user_info(uid).await.unwrap();
    assert_eq!(stored.as_deref(), Some("store-node-1"));

    drop(client);
    node.shutdown().await;
    pools.close().await;
}

#[tokio::test]
async fn test_offline_message_survives_in_postgres() {
    if !check_store_env() {
        return;
    }

    let config = store_config("store-node-2");
    let (stores, pools) = Stores::connect(&config).await.expect("Failed to connect stores");
    let node = TestNode::start_with(config, stores.clone()).await.unwrap();

    let sender = unique_uid(2);
    let recipient = unique_uid(3);
    let mut alice = node.login(sender, "store-alice").await.unwrap();

    let response = alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": recipient, "msgid": 1, "content": "kept in postgres" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);
    assert_eq!(stores.messages.count_offline_messages(recipient).await.unwrap(), 1);

    let mut bob = node.connect().await.unwrap();
    bob.login(recipient, "store-bob").await.unwrap();
    let notify = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    assert_eq!(notify["content"], "kept in postgres");
    bob.ack(&notify["seq"]).await.unwrap();

    node.shutdown().await;
    pools.close().await;
}
