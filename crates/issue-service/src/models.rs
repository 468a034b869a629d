use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A tracked work item. `(issue_id, created_at)` is the physical storage key;
/// `issue_id` alone is the logical identity. The wire format is camelCase.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub issue_id: Uuid,
    pub reporter_id: String,
    pub assignee_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: IssueStatus,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// Visibility and mutability rule: reporter or assignee only.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.reporter_id == user_id || self.assignee_id.as_deref() == Some(user_id)
    }
}

/// Workflow state. Transitions are unrestricted: any value may change to any
/// other, the TO DO -> IN PROGRESS -> ... ordering is advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssueStatus {
    #[serde(rename = "TO DO")]
    ToDo,
    #[serde(rename = "IN PROGRESS")]
    InProgress,
    #[serde(rename = "IN REVIEW")]
    InReview,
    #[serde(rename = "RESOLVED")]
    Resolved,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::ToDo => "TO DO",
            IssueStatus::InProgress => "IN PROGRESS",
            IssueStatus::InReview => "IN REVIEW",
            IssueStatus::Resolved => "RESOLVED",
            IssueStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for IssueStatus {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "TO DO" => Ok(IssueStatus::ToDo),
            "IN PROGRESS" => Ok(IssueStatus::InProgress),
            "IN REVIEW" => Ok(IssueStatus::InReview),
            "RESOLVED" => Ok(IssueStatus::Resolved),
            "CLOSED" => Ok(IssueStatus::Closed),
            other => Err(format!("unknown issue status: {other}")),
        }
    }
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
}

/// Partial update. A `None` field keeps the stored value, with one exception:
/// `description` falls back to the empty string (not the old value) when both
/// the patch and the stored record are missing one. An absent `assignee_id`
/// keeps the current assignee; there is no way to un-assign.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub assignee_id: Option<String>,
}

impl IssuePatch {
    pub fn merge_into(self, mut stored: Issue) -> Issue {
        if let Some(title) = self.title {
            stored.title = title;
        }
        stored.description = Some(self.description.or(stored.description.take()).unwrap_or_default());
        if let Some(status) = self.status {
            stored.status = status;
        }
        if let Some(assignee) = self.assignee_id {
            stored.assignee_id = Some(assignee);
        }
        stored
    }
}
