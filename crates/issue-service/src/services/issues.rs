use chrono::Utc;
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CreateIssueRequest, Issue, IssuePatch, IssueStatus};
use crate::storage::StorageManager;
use crate::store::IssueStore;

/// Orchestrates identity stamping, per-user visibility and attachment URL
/// issuance over the record store and object-store adapters. Handles are
/// injected at construction; there is no process-global instance.
pub struct IssueService {
    store: Arc<dyn IssueStore>,
    storage: StorageManager,
    url_expiration: Duration,
}

impl IssueService {
    pub fn new(store: Arc<dyn IssueStore>, storage: StorageManager, url_expiration: Duration) -> Self {
        Self { store, storage, url_expiration }
    }

    /// Builds the stored record: fresh id, reporter forced to the caller,
    /// status forced to TO DO, server-assigned creation time, empty
    /// attachment list. Request content cannot override any of these.
    pub async fn create(&self, req: CreateIssueRequest, user_id: &str) -> Result<Issue, StoreError> {
        let issue = Issue {
            issue_id: Uuid::new_v4(),
            reporter_id: user_id.to_string(),
            assignee_id: req.assignee_id,
            title: req.title,
            description: req.description,
            status: IssueStatus::ToDo,
            attachments: Vec::new(),
            created_at: Utc::now(),
        };
        self.store.create(issue).await
    }

    pub async fn get_all(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        self.store.list_all(user_id).await
    }

    pub async fn get_all_reported(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        self.store.list_by_reporter(user_id).await
    }

    pub async fn get_all_assigned(&self, user_id: &str) -> Result<Vec<Issue>, StoreError> {
        self.store.list_by_assignee(user_id).await
    }

    pub async fn update(&self, issue_id: Uuid, user_id: &str, patch: IssuePatch) -> Result<Issue, StoreError> {
        self.store.update(issue_id, user_id, patch).await
    }

    pub async fn delete(&self, issue_id: Uuid, user_id: &str) -> Result<Issue, StoreError> {
        self.store.delete(issue_id, user_id).await
    }

    /// Mint a time-limited upload URL for the object key
    /// `{issue_id}/{attachment_id}` and record the query-stripped public URL
    /// on the issue. The returned string is the writable (signed) URL.
    pub async fn upload_url(&self, issue_id: Uuid, user_id: &str, attachment_id: Uuid) -> Result<String, StoreError> {
        self.store.find_authorized(issue_id, user_id).await?;
        let key = format!("{issue_id}/{attachment_id}");
        let upload = self
            .storage
            .backend()
            .presign_put(&key, self.url_expiration)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let public_url = match upload.url.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => upload.url.clone(),
        };
        self.store.append_attachment(issue_id, user_id, &public_url).await?;
        Ok(upload.url)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIssueStore;

    fn service() -> IssueService {
        IssueService::new(
            Arc::new(MemoryIssueStore::default()),
            StorageManager::mock("http://localhost:9000", "issue-attachments"),
            Duration::from_secs(300),
        )
    }

    fn create_request(title: &str) -> CreateIssueRequest {
        CreateIssueRequest { title: title.into(), description: None, assignee_id: None }
    }

    #[tokio::test]
    async fn create_stamps_identity_and_defaults() {
        let svc = service();
        let issue = svc.create(create_request("Bug A"), "U1").await.unwrap();
        assert_eq!(issue.reporter_id, "U1");
        assert_eq!(issue.status, IssueStatus::ToDo);
        assert_eq!(issue.assignee_id, None);
        assert!(issue.attachments.is_empty());
        assert_eq!(issue.title, "Bug A");
    }

    #[tokio::test]
    async fn upload_url_returns_signed_and_records_public() {
        let svc = service();
        let issue = svc.create(create_request("Bug A"), "U1").await.unwrap();

        let attachment_id = Uuid::new_v4();
        let signed = svc.upload_url(issue.issue_id, "U1", attachment_id).await.unwrap();
        assert!(signed.contains('?'));
        assert!(signed.contains(&format!("{}/{}", issue.issue_id, attachment_id)));

        let stored = svc.get_all("U1").await.unwrap();
        let expected_public = signed.split_once('?').map(|(base, _)| base.to_string()).unwrap();
        assert_eq!(stored[0].attachments, vec![expected_public]);
    }

    #[tokio::test]
    async fn upload_url_denied_for_third_party() {
        let svc = service();
        let issue = svc.create(create_request("Bug A"), "U1").await.unwrap();
        let err = svc.upload_url(issue.issue_id, "U2", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied));
        let stored = svc.get_all("U1").await.unwrap();
        assert!(stored[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn third_party_update_leaves_status_unchanged() {
        let svc = service();
        let issue = svc.create(create_request("Bug A"), "U1").await.unwrap();

        let patch = IssuePatch { status: Some(IssueStatus::InProgress), ..Default::default() };
        let err = svc.update(issue.issue_id, "U2", patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied));

        let stored = svc.get_all("U1").await.unwrap();
        assert_eq!(stored[0].status, IssueStatus::ToDo);
    }
}
