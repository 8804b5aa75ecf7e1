//! PostgreSQL implementation of UserStore

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::instrument;

use chat_core::entities::{ApplyStatus, FriendApply, Group, UserInfo};
use chat_core::error::DomainError;
use chat_core::traits::{RepoResult, UserStore};
use chat_core::value_objects::{GroupId, UserId};

use crate::models::{FriendApplyModel, GroupModel, UserInfoModel};
use crate::pool::PgConnectionPool;

use super::acquire;
use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of UserStore
#[derive(Clone)]
pub struct PgUserStore {
    pool: Arc<PgConnectionPool>,
}

impl PgUserStore {
    pub fn new(pool: Arc<PgConnectionPool>) -> Self {
        Self { pool }
    }
}

/// Mark the application accepted and insert both friendship rows.
/// Returns `false` if there was no such application.
async fn accept_apply(
    conn: &mut PgConnection,
    from_uid: i64,
    to_uid: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let updated = sqlx::query(
        r"
        UPDATE friend_apply SET status = $3
        WHERE from_uid = $1 AND to_uid = $2
        ",
    )
    .bind(from_uid)
    .bind(to_uid)
    .bind(ApplyStatus::Accepted.as_i16())
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r"
        INSERT INTO friend (self_uid, friend_uid)
        VALUES ($1, $2), ($2, $1)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(from_uid)
    .bind(to_uid)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Insert the group row and its owner as first member
async fn insert_group(conn: &mut PgConnection, group: &Group) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;

    sqlx::query(
        r"
        INSERT INTO chat_group (id, name, owner_uid, created_at)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(group.id as i64)
    .bind(&group.name)
    .bind(group.owner_uid as i64)
    .bind(group.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO group_member (group_id, uid) VALUES ($1, $2)")
        .bind(group.id as i64)
        .bind(group.owner_uid as i64)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn get_user(&self, name: &str) -> RepoResult<Option<UserInfo>> {
        let mut conn = acquire(&self.pool).await?;
        let result = sqlx::query_as::<_, UserInfoModel>(
            r"
            SELECT uid, name, nick, descr, sex, age, head_image_url
            FROM user_info
            WHERE name = $1
            LIMIT 1
            ",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(UserInfo::from))
    }

    #[instrument(skip(self))]
    async fn get_user_info(&self, uid: UserId) -> RepoResult<Option<UserInfo>> {
        let mut conn = acquire(&self.pool).await?;
        let result = sqlx::query_as::<_, UserInfoModel>(
            r"
            SELECT uid, name, nick, descr, sex, age, head_image_url
            FROM user_info
            WHERE uid = $1
            ",
        )
        .bind(uid as i64)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(UserInfo::from))
    }

    #[instrument(skip(self, info), fields(uid = info.uid))]
    async fn insert_user_info(&self, info: &UserInfo) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        sqlx::query(
            r"
            INSERT INTO user_info (uid, name, nick, descr, sex, age, head_image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (uid) DO UPDATE SET
                name = EXCLUDED.name,
                nick = EXCLUDED.nick,
                descr = EXCLUDED.descr,
                sex = EXCLUDED.sex,
                age = EXCLUDED.age,
                head_image_url = EXCLUDED.head_image_url
            ",
        )
        .bind(info.uid as i64)
        .bind(&info.name)
        .bind(&info.nick)
        .bind(&info.desc)
        .bind(&info.sex)
        .bind(i32::try_from(info.age).unwrap_or(i32::MAX))
        .bind(&info.head_image_url)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self, apply), fields(from = apply.from_uid, to = apply.to_uid))]
    async fn add_friend_apply(&self, apply: &FriendApply) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        sqlx::query(
            r"
            INSERT INTO friend_apply (from_uid, to_uid, descr, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (from_uid, to_uid) DO UPDATE SET
                descr = EXCLUDED.descr,
                status = EXCLUDED.status,
                created_at = EXCLUDED.created_at
            ",
        )
        .bind(apply.from_uid as i64)
        .bind(apply.to_uid as i64)
        .bind(&apply.desc)
        .bind(apply.status.as_i16())
        .bind(apply.created_at)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_apply_list(&self, to_uid: UserId) -> RepoResult<Vec<FriendApply>> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, FriendApplyModel>(
            r"
            SELECT from_uid, to_uid, descr, status, created_at
            FROM friend_apply
            WHERE to_uid = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(to_uid as i64)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(FriendApply::from).collect())
    }

    #[instrument(skip(self))]
    async fn auth_friend_apply(&self, from_uid: UserId, to_uid: UserId) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        let found = accept_apply(&mut conn, from_uid as i64, to_uid as i64)
            .await
            .map_err(map_db_error)?;

        if found {
            Ok(())
        } else {
            Err(DomainError::ApplyNotFound {
                from: from_uid,
                to: to_uid,
            })
        }
    }

    #[instrument(skip(self))]
    async fn get_friend_list(&self, uid: UserId) -> RepoResult<Vec<UserInfo>> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, UserInfoModel>(
            r"
            SELECT u.uid, u.name, u.nick, u.descr, u.sex, u.age, u.head_image_url
            FROM friend f
            INNER JOIN user_info u ON u.uid = f.friend_uid
            WHERE f.self_uid = $1
            ORDER BY f.created_at ASC
            ",
        )
        .bind(uid as i64)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(UserInfo::from).collect())
    }

    #[instrument(skip(self, group), fields(group_id = group.id))]
    async fn create_group(&self, group: &Group) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        insert_group(&mut conn, group).await.map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn get_group(&self, group_id: GroupId) -> RepoResult<Option<Group>> {
        let mut conn = acquire(&self.pool).await?;
        let result = sqlx::query_as::<_, GroupModel>(
            r"
            SELECT id, name, owner_uid, created_at
            FROM chat_group
            WHERE id = $1
            ",
        )
        .bind(group_id as i64)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Group::from))
    }

    #[instrument(skip(self))]
    async fn join_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        let result = sqlx::query("INSERT INTO group_member (group_id, uid) VALUES ($1, $2)")
            .bind(group_id as i64)
            .bind(uid as i64)
            .execute(&mut *conn)
            .await;

        result.map(|_| ()).map_err(|e| {
            if e
                .as_database_error()
                .is_some_and(|d| d.is_foreign_key_violation())
            {
                DomainError::GroupNotFound(group_id)
            } else {
                map_unique_violation(e, || DomainError::AlreadyMember)
            }
        })
    }

    #[instrument(skip(self))]
    async fn quit_group(&self, group_id: GroupId, uid: UserId) -> RepoResult<()> {
        let mut conn = acquire(&self.pool).await?;
        let result = sqlx::query("DELETE FROM group_member WHERE group_id = $1 AND uid = $2")
            .bind(group_id as i64)
            .bind(uid as i64)
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotMember);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_group_members(&self, group_id: GroupId) -> RepoResult<Vec<UserId>> {
        let mut conn = acquire(&self.pool).await?;
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM chat_group WHERE id = $1")
            .bind(group_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_db_error)?;
        if exists.is_none() {
            return Err(DomainError::GroupNotFound(group_id));
        }

        let rows: Vec<(i64,)> = sqlx::query_as(
            r"
            SELECT uid FROM group_member
            WHERE group_id = $1
            ORDER BY seq ASC
            ",
        )
        .bind(group_id as i64)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(rows.into_iter().map(|(uid,)| uid as u64).collect())
    }
}
