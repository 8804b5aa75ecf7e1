//! Node Integration Tests
//!
//! Whole nodes on loopback with in-memory stores, driven over TCP.
//!
//! Run with: cargo test -p integration-tests --test node_tests

use std::time::Duration;

use chat_node::{ErrorCode, MsgId, Stores};
use integration_tests::{shared_stores, test_config, wait_until, TestNode};
use reqwest::StatusCode;
use serde_json::{json, Value};

const SETTLE: Duration = Duration::from_secs(2);

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let node = TestNode::start("node-health").await.unwrap();

    let response = node.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    node.shutdown().await;
}

#[tokio::test]
async fn test_stats_reports_sessions() {
    let node = TestNode::start("node-stats").await.unwrap();
    let _alice = node.login(1, "alice").await.unwrap();

    let stats: Value = node.get("/stats").await.unwrap().json().await.unwrap();
    assert_eq!(stats["node"], "node-stats");
    assert_eq!(stats["sessions"], 1);
    assert_eq!(stats["online_users"], 1);

    node.shutdown().await;
}

// ============================================================================
// Login and session handling
// ============================================================================

#[tokio::test]
async fn test_login_registers_presence() {
    let node = TestNode::start("node-login").await.unwrap();
    let mut client = node.connect().await.unwrap();

    let response = client.login(42, "alice").await.unwrap();
    assert_eq!(response["error"], 0);
    assert_eq!(response["uid"], 42);
    assert_eq!(response["name"], "alice");
    assert!(response["friend_list"].as_array().unwrap().is_empty());

    assert!(node.is_online(42));
    let stored = node
        .node
        .state()
        .presence_store()
        .get_online_user_info(42)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("node-login"));

    node.shutdown().await;
}

#[tokio::test]
async fn test_login_unknown_user_without_init() {
    let node = TestNode::start("node-unknown").await.unwrap();
    let mut client = node.connect().await.unwrap();

    let response = client
        .request(MsgId::LoginReq, MsgId::LoginRsp, &json!({ "uid": 5 }))
        .await
        .unwrap();
    assert_eq!(response["error"], ErrorCode::InvalidParams.as_i32());
    assert!(!node.is_online(5));

    node.shutdown().await;
}

#[tokio::test]
async fn test_unknown_message_id_answers_not_found() {
    let node = TestNode::start("node-notfound").await.unwrap();
    let mut client = node.connect().await.unwrap();

    client.send(9999u32, &json!({})).await.unwrap();
    let response = client.expect(9999u32).await.unwrap();
    assert_eq!(response["error"], ErrorCode::NotFound.as_i32());

    // The dispatcher keeps serving the connection
    let pong = client
        .request(MsgId::HeartbeatReq, MsgId::HeartbeatRsp, &json!({}))
        .await
        .unwrap();
    assert_eq!(pong["error"], 0);

    node.shutdown().await;
}

#[tokio::test]
async fn test_peer_only_message_rejected_from_client() {
    let node = TestNode::start("node-origin").await.unwrap();
    let mut client = node.connect().await.unwrap();

    client
        .send(MsgId::PeerKickReq, &json!({ "uid": 1 }))
        .await
        .unwrap();
    let response = client.expect(MsgId::PeerKickReq).await.unwrap();
    assert_eq!(response["error"], ErrorCode::NotFound.as_i32());

    node.shutdown().await;
}

#[tokio::test]
async fn test_malformed_body_answers_json_error() {
    let node = TestNode::start("node-json").await.unwrap();
    let mut client = node.connect().await.unwrap();

    client
        .send_raw(MsgId::LoginReq.as_u32(), "not json")
        .await
        .unwrap();
    let response = client.expect(MsgId::LoginRsp).await.unwrap();
    assert_eq!(response["error"], ErrorCode::JsonParser.as_i32());

    node.shutdown().await;
}

#[tokio::test]
async fn test_request_before_login_rejected() {
    let node = TestNode::start("node-unauth").await.unwrap();
    let mut client = node.connect().await.unwrap();

    let response = client
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 2, "msgid": 1, "content": "hi" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], ErrorCode::NotAuthenticated.as_i32());

    node.shutdown().await;
}

#[tokio::test]
async fn test_relogin_evicts_previous_session() {
    let node = TestNode::start("node-relogin").await.unwrap();
    let mut first = node.login(7, "alice").await.unwrap();
    let _second = node.login(7, "alice").await.unwrap();

    let notice = first.expect(MsgId::NotifyOffline).await.unwrap();
    assert_eq!(notice["uid"], 7);
    assert!(first.closed_within(SETTLE).await);

    // The new session keeps the user online
    assert!(node.is_online(7));
    let stored = node
        .node
        .state()
        .presence_store()
        .get_online_user_info(7)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("node-relogin"));

    node.shutdown().await;
}

#[tokio::test]
async fn test_logout_closes_session() {
    let node = TestNode::start("node-logout").await.unwrap();
    let mut client = node.login(8, "alice").await.unwrap();

    let response = client
        .request(MsgId::LogoutReq, MsgId::LogoutRsp, &json!({}))
        .await
        .unwrap();
    assert_eq!(response["error"], 0);
    assert!(client.closed_within(SETTLE).await);
    assert!(!node.is_online(8));

    let state = node.node.state().clone();
    assert!(wait_until(SETTLE, || state.sessions().count() == 0).await);

    node.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_clears_presence() {
    let node = TestNode::start("node-disconnect").await.unwrap();
    let client = node.login(9, "alice").await.unwrap();
    assert!(node.is_online(9));

    drop(client);

    let state = node.node.state().clone();
    assert!(wait_until(SETTLE, || !state.presence().is_online(9)).await);

    // The shared entry is removed right after the local one
    let mut cleared = false;
    for _ in 0..100 {
        if state.presence_store().get_online_user_info(9).await.unwrap().is_none() {
            cleared = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cleared);

    node.shutdown().await;
}

// ============================================================================
// Text chat and reliable delivery
// ============================================================================

#[tokio::test]
async fn test_text_chat_delivered_and_acked() {
    let node = TestNode::start("node-text").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut bob = node.login(1002, "bob").await.unwrap();

    let response = alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 1002, "msgid": 1, "content": "hello bob" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);
    assert_eq!(response["msgid"], 1);
    assert!(response["server_msgid"].as_u64().unwrap() > 0);

    let notify = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    assert_eq!(notify["fromuid"], 1001);
    assert_eq!(notify["touid"], 1002);
    assert_eq!(notify["content"], "hello bob");
    assert_eq!(notify["server_msgid"], response["server_msgid"]);

    let ack = bob.ack(&notify["seq"]).await.unwrap();
    assert_eq!(ack["acked"], true);
    assert_eq!(node.node.state().delivery().pending_count(), 0);

    // Acknowledging twice is harmless
    let ack = bob.ack(&notify["seq"]).await.unwrap();
    assert_eq!(ack["acked"], false);

    node.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_msgid_delivered_once() {
    let node = TestNode::start("node-dedup").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut bob = node.login(1002, "bob").await.unwrap();

    let body = json!({ "touid": 1002, "msgid": 77, "content": "once" });
    let first = alice
        .request(MsgId::TextChatReq, MsgId::TextChatRsp, &body)
        .await
        .unwrap();
    assert_eq!(first["error"], 0);

    let second = alice
        .request(MsgId::TextChatReq, MsgId::TextChatRsp, &body)
        .await
        .unwrap();
    assert_eq!(second["error"], ErrorCode::RepeatMessage.as_i32());

    let notify = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    bob.ack(&notify["seq"]).await.unwrap();
    assert!(bob.try_recv(Duration::from_millis(300)).await.is_none());

    node.shutdown().await;
}

#[tokio::test]
async fn test_offline_message_replayed_on_login() {
    let node = TestNode::start("node-offline").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();

    let response = alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 1002, "msgid": 5, "content": "while you were out" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);

    let stored = node
        .node
        .state()
        .messages()
        .count_offline_messages(1002)
        .await
        .unwrap();
    assert_eq!(stored, 1);

    // Login response comes first, then the replay
    let mut bob = node.connect().await.unwrap();
    let login = bob.login(1002, "bob").await.unwrap();
    assert_eq!(login["error"], 0);
    let notify = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    assert_eq!(notify["content"], "while you were out");
    bob.ack(&notify["seq"]).await.unwrap();

    node.shutdown().await;
}

#[tokio::test]
async fn test_unacked_delivery_evicts_client() {
    let mut config = test_config("node-evict");
    config.delivery.ack_timeout = Duration::from_millis(200);
    config.delivery.max_retries = 3;
    let node = TestNode::start_with(config, Stores::memory()).await.unwrap();

    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut bob = node.login(1002, "bob").await.unwrap();

    alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 1002, "msgid": 1, "content": "are you there" }),
        )
        .await
        .unwrap();

    // Initial send plus two re-sends, all with the same seq
    let first = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    for _ in 0..2 {
        let again = bob.expect(MsgId::NotifyTextChat).await.unwrap();
        assert_eq!(again["seq"], first["seq"]);
    }
    assert!(bob.closed_within(SETTLE).await);

    let state = node.node.state().clone();
    assert!(wait_until(SETTLE, || !state.presence().is_online(1002)).await);
    assert_eq!(state.messages().count_offline_messages(1002).await.unwrap(), 1);
    assert!(state.presence_store().get_online_user_info(1002).await.unwrap().is_none());

    node.shutdown().await;
}

// ============================================================================
// Friends and groups
// ============================================================================

#[tokio::test]
async fn test_friend_apply_and_auth() {
    let node = TestNode::start("node-friends").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut bob = node.login(1002, "bob").await.unwrap();

    let response = alice
        .request(
            MsgId::AddFriendReq,
            MsgId::AddFriendRsp,
            &json!({ "touid": 1002, "desc": "hi, it's alice" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);

    let apply = bob.expect(MsgId::NotifyAddFriend).await.unwrap();
    assert_eq!(apply["applyuid"], 1001);
    assert_eq!(apply["name"], "alice");
    assert_eq!(apply["desc"], "hi, it's alice");

    let response = bob
        .request(
            MsgId::AuthFriendReq,
            MsgId::AuthFriendRsp,
            &json!({ "fromuid": 1001 }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);
    assert_eq!(response["uid"], 1001);

    let auth = alice.expect(MsgId::NotifyAuthFriend).await.unwrap();
    assert_eq!(auth["fromuid"], 1002);
    assert_eq!(auth["name"], "bob");

    let friends = node.node.state().users().get_friend_list(1001).await.unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].uid, 1002);

    node.shutdown().await;
}

#[tokio::test]
async fn test_group_text_fan_out() {
    let node = TestNode::start("node-groups").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut bob = node.login(1002, "bob").await.unwrap();

    let group = alice
        .request(
            MsgId::CreateGroupReq,
            MsgId::CreateGroupRsp,
            &json!({ "name": "rustaceans" }),
        )
        .await
        .unwrap();
    assert_eq!(group["error"], 0);
    let group_id = group["groupid"].clone();

    let joined = bob
        .request(
            MsgId::JoinGroupReq,
            MsgId::JoinGroupRsp,
            &json!({ "groupid": group_id }),
        )
        .await
        .unwrap();
    assert_eq!(joined["error"], 0);

    let notice = alice.expect(MsgId::NotifyJoinGroup).await.unwrap();
    assert_eq!(notice["uid"], 1002);

    let members = alice
        .request(
            MsgId::GroupMembersReq,
            MsgId::GroupMembersRsp,
            &json!({ "groupid": group_id }),
        )
        .await
        .unwrap();
    assert_eq!(members["members"].as_array().unwrap().len(), 2);

    let sent = alice
        .request(
            MsgId::GroupTextReq,
            MsgId::GroupTextRsp,
            &json!({ "groupid": group_id, "msgid": 1, "content": "hello group" }),
        )
        .await
        .unwrap();
    assert_eq!(sent["error"], 0);

    let message = bob.expect(MsgId::NotifyGroupText).await.unwrap();
    assert_eq!(message["groupid"], group_id);
    assert_eq!(message["fromuid"], 1001);
    assert_eq!(message["content"], "hello group");
    bob.ack(&message["seq"]).await.unwrap();

    // The sender gets no copy of its own message
    assert!(alice.try_recv(Duration::from_millis(300)).await.is_none());

    node.shutdown().await;
}

#[tokio::test]
async fn test_group_text_requires_membership() {
    let node = TestNode::start("node-members").await.unwrap();
    let mut alice = node.login(1001, "alice").await.unwrap();
    let mut carol = node.login(1003, "carol").await.unwrap();

    let group = alice
        .request(
            MsgId::CreateGroupReq,
            MsgId::CreateGroupRsp,
            &json!({ "name": "private" }),
        )
        .await
        .unwrap();

    let response = carol
        .request(
            MsgId::GroupTextReq,
            MsgId::GroupTextRsp,
            &json!({ "groupid": group["groupid"], "msgid": 1, "content": "let me in" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], ErrorCode::InvalidParams.as_i32());

    node.shutdown().await;
}

// ============================================================================
// Cross-node routing
// ============================================================================

#[tokio::test]
async fn test_text_chat_forwarded_to_peer_node() {
    let stores = shared_stores();
    let node_a = TestNode::start_with(test_config("node-a"), stores.clone())
        .await
        .unwrap();
    let node_b = TestNode::start_with(test_config("node-b"), stores)
        .await
        .unwrap();
    node_a.link(&node_b);
    node_b.link(&node_a);

    let mut alice = node_a.login(1001, "alice").await.unwrap();
    let mut bob = node_b.login(1002, "bob").await.unwrap();

    let response = alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 1002, "msgid": 1, "content": "across nodes" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);

    let notify = bob.expect(MsgId::NotifyTextChat).await.unwrap();
    assert_eq!(notify["fromuid"], 1001);
    assert_eq!(notify["content"], "across nodes");
    bob.ack(&notify["seq"]).await.unwrap();

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn test_login_on_another_node_kicks_old_session() {
    let stores = shared_stores();
    let node_a = TestNode::start_with(test_config("node-a"), stores.clone())
        .await
        .unwrap();
    let node_b = TestNode::start_with(test_config("node-b"), stores.clone())
        .await
        .unwrap();
    node_a.link(&node_b);

    let mut on_b = node_b.login(1002, "bob").await.unwrap();
    let _on_a = node_a.login(1002, "bob").await.unwrap();

    let notice = on_b.expect(MsgId::NotifyOffline).await.unwrap();
    assert_eq!(notice["uid"], 1002);
    assert!(on_b.closed_within(SETTLE).await);
    assert!(!node_b.is_online(1002));

    let stored = stores.presence.get_online_user_info(1002).await.unwrap();
    assert_eq!(stored.as_deref(), Some("node-a"));

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_peer_falls_back_to_offline() {
    let stores = shared_stores();
    let node = TestNode::start_with(test_config("node-a"), stores.clone())
        .await
        .unwrap();
    // Presence names a node this one cannot reach
    stores
        .presence
        .set_online_user_info(1002, "node-gone")
        .await
        .unwrap();

    let mut alice = node.login(1001, "alice").await.unwrap();
    let response = alice
        .request(
            MsgId::TextChatReq,
            MsgId::TextChatRsp,
            &json!({ "touid": 1002, "msgid": 3, "content": "anyone?" }),
        )
        .await
        .unwrap();
    assert_eq!(response["error"], 0);
    assert_eq!(stores.messages.count_offline_messages(1002).await.unwrap(), 1);

    node.shutdown().await;
}
