use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Issue, IssuePatch};

/// Durable CRUD access to issue records with two query paths (by reporter,
/// by assignee). Every operation addressed at a missing or unauthorized issue
/// returns `StoreError::Denied`; there is no silent fall-through.
#[async_trait]
pub trait IssueStore: Send + Sync + 'static {
    async fn list_by_reporter(&self, user_id: &str) -> Result<Vec<Issue>, StoreError>;

    async fn list_by_assignee(&self, user_id: &str) -> Result<Vec<Issue>, StoreError>;

    /// Everything visible to `user_id`: assigned issues followed by reported
    /// ones, concatenated without deduplication. An issue where the user is
    /// both reporter and assignee appears twice; callers rely on that.
    async fn list_all(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        let mut items = self.list_by_assignee(user_id).await?;
        items.extend(self.list_by_reporter(user_id).await?);
        Ok(items)
    }

    /// The record for `issue_id` iff the caller is its reporter or assignee.
    /// "Does not exist" and "exists but forbidden" both collapse to `Denied`.
    async fn find_authorized(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError>;

    /// Persist a fully-populated record. Fails with `AlreadyExists` on key
    /// conflict (not expected with freshly generated ids).
    async fn create(&self, issue: Issue) -> Result<Issue, StoreError>;

    /// Re-reads via `find_authorized`, merges the patch (see
    /// `IssuePatch::merge_into`) and returns the updated record.
    async fn update(&self, issue_id: Uuid, user_id: &str, patch: IssuePatch) -> Result<Issue, StoreError>;

    /// Reporter-only. Returns the record as it was before deletion.
    async fn delete(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError>;

    /// Atomically append `url` to the attachment list, creating it if absent.
    /// Concurrent appends to the same issue must not lose an element.
    /// Returns the attachment list after the append.
    async fn append_attachment(&self, issue_id: Uuid, user_id: &str, url: &str) -> Result<Vec<String>, StoreError>;

    /// Liveness probe against the backing store.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

const ISSUE_COLUMNS: &str =
    "issue_id, reporter_id, assignee_id, title, description, status, attachments, created_at";

/// Postgres-backed store. The table is keyed by `(issue_id, created_at)` with
/// secondary indexes on `reporter_id` and `assignee_id`.
#[derive(Clone)]
pub struct PgIssueStore {
    pool: Pool<Postgres>,
}

impl PgIssueStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IssueStore for PgIssueStore {
    async fn list_by_reporter(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        let items = sqlx::query_as::<_, Issue>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE reporter_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_by_assignee(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        let items = sqlx::query_as::<_, Issue>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE assignee_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn find_authorized(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError> {
        let row = sqlx::query_as::<_, Issue>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = $1"
        ))
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(issue) if issue.is_visible_to(user_id) => Ok(issue),
            _ => Err(StoreError::Denied),
        }
    }

    async fn create(&self, issue: Issue) -> Result<Issue, StoreError> {
        sqlx::query(
            "INSERT INTO issues (issue_id, created_at, reporter_id, assignee_id, title, description, status, attachments) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(issue.issue_id)
        .bind(issue.created_at)
        .bind(&issue.reporter_id)
        .bind(&issue.assignee_id)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.status.as_str())
        .bind(&issue.attachments)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
            _ => StoreError::from(e),
        })?;
        Ok(issue)
    }

    async fn update(&self, issue_id: Uuid, user_id: &str, patch: IssuePatch) -> Result<Issue, StoreError> {
        let stored = self.find_authorized(issue_id, user_id).await?;
        let created_at = stored.created_at;
        let merged = patch.merge_into(stored);
        let row = sqlx::query_as::<_, Issue>(&format!(
            "UPDATE issues SET title = $3, description = $4, status = $5, assignee_id = $6 \
             WHERE issue_id = $1 AND created_at = $2 RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(issue_id)
        .bind(created_at)
        .bind(&merged.title)
        .bind(&merged.description)
        .bind(merged.status.as_str())
        .bind(&merged.assignee_id)
        .fetch_optional(&self.pool)
        .await?;
        // The row can vanish between the read and the write (concurrent
        // delete); surface that as a denial rather than a phantom success.
        row.ok_or(StoreError::Denied)
    }

    async fn delete(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError> {
        let stored = self.find_authorized(issue_id, user_id).await?;
        if stored.reporter_id != user_id {
            return Err(StoreError::Denied);
        }
        sqlx::query("DELETE FROM issues WHERE issue_id = $1 AND created_at = $2")
            .bind(issue_id)
            .bind(stored.created_at)
            .execute(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn append_attachment(&self, issue_id: Uuid, user_id: &str, url: &str) -> Result<Vec<String>, StoreError> {
        let stored = self.find_authorized(issue_id, user_id).await?;
        // Single-statement array append: atomic under the row lock, so
        // concurrent uploads to the same issue cannot lose an element.
        let row: Option<(Vec<String>,)> = sqlx::query_as(
            "UPDATE issues SET attachments = array_append(attachments, $3) \
             WHERE issue_id = $1 AND created_at = $2 RETURNING attachments",
        )
        .bind(issue_id)
        .bind(stored.created_at)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(attachments,)| attachments).ok_or(StoreError::Denied)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-process store keyed by `issue_id`, used in tests and in the `memory`
/// store mode. Mutations take the write lock, so the append path is atomic.
#[derive(Default)]
pub struct MemoryIssueStore {
    issues: RwLock<HashMap<Uuid, Issue>>,
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn list_by_reporter(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        let issues = self.issues.read().await;
        Ok(issues.values().filter(|i| i.reporter_id == user_id).cloned().collect())
    }

    async fn list_by_assignee(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        let issues = self.issues.read().await;
        Ok(issues
            .values()
            .filter(|i| i.assignee_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn find_authorized(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError> {
        let issues = self.issues.read().await;
        match issues.get(&issue_id) {
            Some(issue) if issue.is_visible_to(user_id) => Ok(issue.clone()),
            _ => Err(StoreError::Denied),
        }
    }

    async fn create(&self, issue: Issue) -> Result<Issue, StoreError> {
        let mut issues = self.issues.write().await;
        if issues.contains_key(&issue.issue_id) {
            return Err(StoreError::AlreadyExists);
        }
        issues.insert(issue.issue_id, issue.clone());
        Ok(issue)
    }

    async fn update(&self, issue_id: Uuid, user_id: &str, patch: IssuePatch) -> Result<Issue, StoreError> {
        let mut issues = self.issues.write().await;
        let stored = match issues.get(&issue_id) {
            Some(issue) if issue.is_visible_to(user_id) => issue.clone(),
            _ => return Err(StoreError::Denied),
        };
        let merged = patch.merge_into(stored);
        issues.insert(issue_id, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError> {
        let mut issues = self.issues.write().await;
        let is_reporter = issues
            .get(&issue_id)
            .map(|i| i.reporter_id == user_id)
            .unwrap_or(false);
        if !is_reporter {
            return Err(StoreError::Denied);
        }
        issues.remove(&issue_id).ok_or(StoreError::Denied)
    }

    async fn append_attachment(&self, issue_id: Uuid, user_id: &str, url: &str) -> Result<Vec<String>, StoreError> {
        let mut issues = self.issues.write().await;
        match issues.get_mut(&issue_id) {
            Some(issue) if issue.is_visible_to(user_id) => {
                issue.attachments.push(url.to_string());
                Ok(issue.attachments.clone())
            }
            _ => Err(StoreError::Denied),
        }
    }
}
