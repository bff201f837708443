//! Remote API surface.
//!
//! The engine consumes the backend exclusively through the [`Backend`]
//! trait: every fetch and every mutation the filesystem can express.
//! The production implementation is [`http::HttpBackend`]; tests use
//! [`fake::FakeBackend`]. All calls are async and carry an [`OpCtx`]
//! deadline that implementations must honour at every I/O boundary.

pub mod fake;
pub mod http;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Health, Initiative, Issue, Label,
    Milestone, Project, Relation, RelationType, State, Team, Update, UpdateParent, User,
};

/// Default deadline applied to every request-servicing call.
pub const OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cancellation/deadline token passed through every suspension point.
#[derive(Debug, Clone, Copy)]
pub struct OpCtx {
    deadline: Instant,
}

impl OpCtx {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now() + timeout }
    }

    /// Deadline for read-path operations.
    pub fn read() -> Self {
        Self::with_timeout(OP_TIMEOUT)
    }

    /// Deadline for mutation paths.
    pub fn mutation() -> Self {
        Self::with_timeout(OP_TIMEOUT)
    }

    /// Time left before the deadline fires; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend rejected request: {0}")]
    Backend(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Minimal field-wise update payload for an issue.
///
/// The write pipeline emits only the fields whose value actually changed;
/// the key set of this map is therefore exactly the changed-field set, and
/// the tests assert on it. Clearing a field is an explicit JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl IssuePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn clear(&mut self, key: &str) {
        self.fields.insert(key.to_string(), serde_json::Value::Null);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.fields
    }
}

/// Everything the filesystem asks of the remote tracker.
#[async_trait]
pub trait Backend: Send + Sync {
    // Fetches.
    async fn viewer(&self, ctx: OpCtx) -> ApiResult<User>;
    async fn teams(&self, ctx: OpCtx) -> ApiResult<Vec<Team>>;
    async fn users(&self, ctx: OpCtx) -> ApiResult<Vec<User>>;
    async fn team_states(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<State>>;
    async fn team_labels(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Label>>;
    async fn team_issues(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Issue>>;
    async fn issue_by_identifier(&self, ctx: OpCtx, identifier: &str) -> ApiResult<Option<Issue>>;
    async fn issues_assigned(&self, ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>>;
    async fn issues_created(&self, ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>>;
    async fn project_issues(&self, ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Issue>>;
    async fn team_projects(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Project>>;
    async fn team_cycles(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Cycle>>;
    async fn issue_comments(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Comment>>;
    async fn documents(&self, ctx: OpCtx, scope: &DocScope) -> ApiResult<Vec<Document>>;
    async fn project_milestones(&self, ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Milestone>>;
    async fn updates(&self, ctx: OpCtx, parent: &UpdateParent) -> ApiResult<Vec<Update>>;
    async fn initiatives(&self, ctx: OpCtx) -> ApiResult<Vec<Initiative>>;
    async fn initiative_projects(&self, ctx: OpCtx, initiative_id: &str)
        -> ApiResult<Vec<Project>>;
    async fn issue_attachments(
        &self,
        ctx: OpCtx,
        issue_id: &str,
    ) -> ApiResult<(Vec<Attachment>, Vec<EmbeddedFile>)>;
    async fn issue_relations(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Relation>>;
    /// Fetch a binary blob from the backend's CDN with the API credential.
    async fn download(&self, ctx: OpCtx, url: &str) -> ApiResult<Bytes>;

    // Mutations.
    async fn create_issue(&self, ctx: OpCtx, team_id: &str, title: &str) -> ApiResult<Issue>;
    async fn update_issue(&self, ctx: OpCtx, issue_id: &str, patch: &IssuePatch)
        -> ApiResult<Issue>;
    async fn archive_issue(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<()>;
    async fn create_comment(&self, ctx: OpCtx, issue_id: &str, body: &str) -> ApiResult<Comment>;
    async fn delete_comment(&self, ctx: OpCtx, comment_id: &str) -> ApiResult<()>;
    async fn create_document(
        &self,
        ctx: OpCtx,
        scope: &DocScope,
        title: &str,
        content: &str,
    ) -> ApiResult<Document>;
    async fn update_document(
        &self,
        ctx: OpCtx,
        doc_id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> ApiResult<Document>;
    async fn delete_document(&self, ctx: OpCtx, doc_id: &str) -> ApiResult<()>;
    async fn create_label(
        &self,
        ctx: OpCtx,
        team_id: &str,
        name: &str,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label>;
    async fn update_label(
        &self,
        ctx: OpCtx,
        label_id: &str,
        name: Option<&str>,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label>;
    async fn delete_label(&self, ctx: OpCtx, label_id: &str) -> ApiResult<()>;
    async fn create_milestone(
        &self,
        ctx: OpCtx,
        project_id: &str,
        name: &str,
        description: &str,
        target_date: Option<NaiveDate>,
    ) -> ApiResult<Milestone>;
    async fn create_update(
        &self,
        ctx: OpCtx,
        parent: &UpdateParent,
        body: &str,
        health: Health,
    ) -> ApiResult<Update>;
    async fn create_attachment(
        &self,
        ctx: OpCtx,
        issue_id: &str,
        url: &str,
        title: Option<&str>,
    ) -> ApiResult<Attachment>;
    async fn delete_attachment(&self, ctx: OpCtx, attachment_id: &str) -> ApiResult<()>;
    async fn create_relation(
        &self,
        ctx: OpCtx,
        issue_id: &str,
        related_issue_id: &str,
        relation_type: RelationType,
    ) -> ApiResult<Relation>;
    async fn delete_relation(&self, ctx: OpCtx, relation_id: &str) -> ApiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keys_track_inserts() {
        let mut patch = IssuePatch::new();
        patch.set("title", serde_json::json!("New title"));
        patch.clear("assignee");
        assert_eq!(patch.keys(), vec!["assignee", "title"]);
        assert!(patch.get("assignee").unwrap().is_null());
    }

    #[test]
    fn ctx_remaining_counts_down() {
        let ctx = OpCtx::with_timeout(Duration::from_millis(50));
        assert!(!ctx.expired());
        std::thread::sleep(Duration::from_millis(60));
        assert!(ctx.expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
