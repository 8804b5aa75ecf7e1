use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::entities::{ApplyStatus, FriendApply, Group, UserInfo};
use crate::error::DomainError;
use crate::traits::{RepoResult, UserStore};
use crate::value_objects::{GroupId, UserId};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserInfo>,
    applies: Vec<FriendApply>,
    friends: HashMap<UserId, Vec<UserId>>,
    groups: HashMap<GroupId, Group>,
    members: HashMap<GroupId, Vec<UserId>>,
}

impl Tables {
    fn add_friend(&mut self, uid: UserId, friend: UserId) {
        let list = self.friends.entry(uid).or_default();
        if !list.contains(&friend) {
            list.push(friend);
        }
    }
}

/// `UserStore` kept in process memory
#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, name: &str) -> RepoResult<Option<UserInfo>> {
        let tables = self.tables.lock();
        Ok(tables.users.values().find(|u| u.name == name).cloned())
    }

    async fn get_user_info(&self, uid: UserId) -> RepoResult<Option<UserInfo>> {
        Ok(self.tables.lock().users.get(&uid).cloned())
    }

    async fn insert_user_info(&self, info: &UserInfo) -> RepoResult<()> {
        self.tables.lock().users.insert(info.uid, info.clone());
        Ok(())
    }

    async fn add_friend_apply(&self, apply: &FriendApply) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        tables
            .applies
            .retain(|a| !(a.from_uid == apply.from_uid && a.to_uid == apply.to_uid));
        tables.applies.push(apply.clone());
        Ok(())
    }

    async fn get_apply_list(&self, to_uid: UserId) -> RepoResult<Vec<FriendApply>> {
        let tables = self.tables.lock();
        Ok(tables
            .applies
            .iter()
            .filter(|a| a.to_uid == to_uid)
            .cloned()
            .collect())
    }

    async fn auth_friend_apply(&self, from_uid: UserId, to_uid: UserId) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        let apply = tables
            .applies
            .iter_mut()
            .find(|a| a.from_uid == from_uid && a.to_uid == to_uid)
            .ok_or(DomainError::ApplyNotFound {
                from: from_uid,
                to: to_uid,
            })?;
        apply.status = ApplyStatus::Accepted;

        tables.add_friend(from_uid, to_uid);
        tables.add_friend(to_uid, from_uid);
        Ok(())
    }

    async fn get_friend_list(&self, uid: UserId) -> RepoResult<Vec<UserInfo>> {
        let tables = self.tables.lock();
        let Some(ids) = tables.friends.get(&uid) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn create_group(&self, group: &Group) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        tables.groups.insert(group.id, group.clone());
        tables.members.insert(group.id, vec![group.owner_uid]);
        Ok(())
    }

    async fn get_group(&self, group_id: GroupId) -> RepoResult<Option<Group>> {
        Ok(self.tables.lock().groups.get(&group_id).cloned())
    }

    async fn join_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        let members = tables
            .members
            .get_mut(&group_id)
            .ok_or(DomainError::GroupNotFound(group_id))?;
        if members.contains(&uid) {
            return Err(DomainError::AlreadyMember);
        }
        members.push(uid);
        Ok(())
    }

    async fn quit_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        let members = tables
            .members
            .get_mut(&group_id)
            .ok_or(DomainError::GroupNotFound(group_id))?;
        let before = members.len();
        members.retain(|m| *m != uid);
        if members.len() == before {
            return Err(DomainError::NotMember);
        }
        Ok(())
    }

    async fn get_group_members(&self, group_id: GroupId) -> RepoResult<Vec<UserId>> {
        let tables = self.tables.lock();
        tables
            .members
            .get(&group_id)
            .cloned()
            .ok_or(DomainError::GroupNotFound(group_id))
    }
}
