use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::entities::ChatMessage;
use crate::traits::{MessageStore, RepoResult};
use crate::value_objects::UserId;

/// Offline message queues kept in process memory
#[derive(Default)]
pub struct MemoryMessageStore {
    queues: Mutex<HashMap<UserId, Vec<ChatMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save_offline_message(&self, message: &ChatMessage) -> RepoResult<()> {
        self.queues
            .lock()
            .entry(message.to_uid)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn take_offline_messages(&self, uid: UserId) -> RepoResult<Vec<ChatMessage>> {
        Ok(self.queues.lock().remove(&uid).unwrap_or_default())
    }

    async fn count_offline_messages(&self, uid: UserId) -> RepoResult<usize> {
        Ok(self.queues.lock().get(&uid).map_or(0, Vec::len))
    }
}
