use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::traits::{PresenceStore, RepoResult};
use crate::value_objects::UserId;

#[derive(Default)]
struct PresenceTables {
    online: HashMap<UserId, String>,
    msg_ids: HashMap<(UserId, u64), Instant>,
}

impl PresenceTables {
    fn live_msg_id(&mut self, key: (UserId, u64), now: Instant) -> bool {
        match self.msg_ids.get(&key) {
            Some(deadline) if *deadline > now => true,
            Some(_) => {
                self.msg_ids.remove(&key);
                false
            }
            None => false,
        }
    }
}

/// `PresenceStore` kept in process memory
///
/// Nodes sharing one instance (through an `Arc`) see each other's presence,
/// which is how multi-node tests run without Redis.
#[derive(Default)]
pub struct MemoryPresenceStore {
    tables: Mutex<PresenceTables>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set_online_user_info(&self, uid: UserId, node: &str) -> RepoResult<()> {
        self.tables.lock().online.insert(uid, node.to_string());
        Ok(())
    }

    async fn get_online_user_info(&self, uid: UserId) -> RepoResult<Option<String>> {
        Ok(self.tables.lock().online.get(&uid).cloned())
    }

    async fn del_online_user_info(&self, uid: UserId) -> RepoResult<()> {
        self.tables.lock().online.remove(&uid);
        Ok(())
    }

    async fn del_online_user_info_if(&self, uid: UserId, node: &str) -> RepoResult<bool> {
        let mut tables = self.tables.lock();
        if tables.online.get(&uid).is_some_and(|n| n == node) {
            tables.online.remove(&uid);
            return Ok(true);
        }
        Ok(false)
    }

    async fn set_user_msg_id(&self, uid: UserId, msg_id: u64, ttl: Duration) -> RepoResult<bool> {
        let now = Instant::now();
        let mut tables = self.tables.lock();
        if tables.live_msg_id((uid, msg_id), now) {
            return Ok(false);
        }
        tables.msg_ids.insert((uid, msg_id), now + ttl);
        Ok(true)
    }

    async fn get_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool> {
        Ok(self.tables.lock().live_msg_id((uid, msg_id), Instant::now()))
    }

    async fn expire_user_msg_id(
        &self,
        uid: UserId,
        msg_id: u64,
        ttl: Duration,
    ) -> RepoResult<bool> {
        let now = Instant::now();
        let mut tables = self.tables.lock();
        if !tables.live_msg_id((uid, msg_id), now) {
            return Ok(false);
        }
        tables.msg_ids.insert((uid, msg_id), now + ttl);
        Ok(true)
    }

    async fn del_user_msg_id(&self, uid: UserId, msg_id: u64) -> RepoResult<bool> {
        let mut tables = self.tables.lock();
        let live = tables.live_msg_id((uid, msg_id), Instant::now());
        tables.msg_ids.remove(&(uid, msg_id));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_online_entries() {
        let store = MemoryPresenceStore::new();
        store.set_online_user_info(1, "node-a").await.unwrap();
        assert_eq!(
            store.get_online_user_info(1).await.unwrap().as_deref(),
            Some("node-a")
        );

        assert!(!store.del_online_user_info_if(1, "node-b").await.unwrap());
        assert!(store.del_online_user_info_if(1, "node-a").await.unwrap());
        assert!(store.get_online_user_info(1).await.unwrap().is_none());

        store.set_online_user_info(2, "node-a").await.unwrap();
        store.del_online_user_info(2).await.unwrap();
        assert!(store.get_online_user_info(2).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_msg_id_dedup_window() {
        let store = MemoryPresenceStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.set_user_msg_id(1, 100, ttl).await.unwrap());
        assert!(!store.set_user_msg_id(1, 100, ttl).await.unwrap());
        assert!(store.get_user_msg_id(1, 100).await.unwrap());
        assert!(store.set_user_msg_id(2, 100, ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!store.get_user_msg_id(1, 100).await.unwrap());
        assert!(!store.expire_user_msg_id(1, 100, ttl).await.unwrap());
        assert!(store.set_user_msg_id(1, 100, ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_extends_window() {
        let store = MemoryPresenceStore::new();
        let ttl = Duration::from_secs(10);

        store.set_user_msg_id(1, 5, ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.expire_user_msg_id(1, 5, ttl).await.unwrap());
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.get_user_msg_id(1, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_msg_id_can_be_recorded_again() {
        let store = MemoryPresenceStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.set_user_msg_id(1, 100, ttl).await.unwrap());
        assert!(store.del_user_msg_id(1, 100).await.unwrap());
        assert!(!store.del_user_msg_id(1, 100).await.unwrap());
        assert!(store.set_user_msg_id(1, 100, ttl).await.unwrap());
    }
}
