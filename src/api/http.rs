//! GraphQL HTTP client for the remote tracker.
//!
//! One POST per operation against the backend's `/graphql` endpoint,
//! authenticated with the configured API key. Responses are decoded through
//! thin wire structs and mapped into the flat [`crate::model`] records; the
//! engine never sees the wire shapes. Every call is bounded by the caller's
//! [`OpCtx`] deadline via `tokio::time::timeout`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ApiError, ApiResult, Backend, IssuePatch, OpCtx};
use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Health, Initiative, Issue, Label,
    Milestone, Project, Relation, RelationType, State, StateType, Team, Update, UpdateParent, User,
};

const DEFAULT_ENDPOINT: &str = "https://api.linear.app/graphql";

/// Markdown-embedded upload links inside issue descriptions.
static UPLOAD_URL: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"https://uploads\.[A-Za-z0-9./_%-]+").expect("upload url pattern")
});

pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    /// Per-operation request counters, logged at unmount when enabled.
    stats: Option<Mutex<BTreeMap<&'static str, u64>>>,
}

impl HttpBackend {
    pub fn new(api_key: String, collect_stats: bool) -> Self {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT.to_string(), collect_stats)
    }

    pub fn with_endpoint(api_key: String, endpoint: String, collect_stats: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            stats: collect_stats.then(|| Mutex::new(BTreeMap::new())),
        }
    }

    /// Snapshot of the per-operation request counters.
    pub fn stats(&self) -> Vec<(&'static str, u64)> {
        match &self.stats {
            Some(stats) => stats
                .lock()
                .map(|s| s.iter().map(|(k, v)| (*k, *v)).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn bump(&self, op: &'static str) {
        if let Some(stats) = &self.stats {
            if let Ok(mut stats) = stats.lock() {
                *stats.entry(op).or_insert(0) += 1;
            }
        }
    }

    /// POST one GraphQL document and return the `data` object.
    async fn post(&self, ctx: OpCtx, op: &'static str, query: &str, vars: Value) -> ApiResult<Value> {
        self.bump(op);
        if ctx.expired() {
            return Err(ApiError::Timeout);
        }

        let body = json!({ "query": query, "variables": vars });
        let send = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(ctx.remaining(), send)
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let payload: Value = tokio::time::timeout(ctx.remaining(), response.json())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(op, %message, "graphql error");
                return Err(ApiError::Backend(message));
            }
        }
        if !status.is_success() {
            return Err(ApiError::Backend(format!("http status {status}")));
        }

        debug!(op, "graphql ok");
        payload
            .get("data")
            .cloned()
            .ok_or_else(|| ApiError::Decode("response carries no data".into()))
    }

    /// Walk `path` into `data` and deserialize the value found there.
    fn pluck<T: DeserializeOwned>(mut data: Value, path: &[&str]) -> ApiResult<T> {
        for segment in path {
            data = data
                .get_mut(*segment)
                .map(Value::take)
                .ok_or_else(|| ApiError::Decode(format!("missing field `{segment}`")))?;
        }
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Same as [`Self::pluck`] but a JSON `null` anywhere on the path
    /// becomes `None` instead of a decode error.
    fn pluck_opt<T: DeserializeOwned>(mut data: Value, path: &[&str]) -> ApiResult<Option<T>> {
        for segment in path {
            match data.get_mut(*segment).map(Value::take) {
                Some(Value::Null) | None => return Ok(None),
                Some(v) => data = v,
            }
        }
        serde_json::from_value(data)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// --- Wire shapes -----------------------------------------------------------

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamNode {
    id: String,
    key: String,
    name: String,
    icon: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TeamNode> for Team {
    fn from(n: TeamNode) -> Self {
        Team {
            id: n.id,
            key: n.key,
            name: n.name,
            icon: n.icon,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    id: String,
    name: String,
    email: String,
    display_name: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserNode> for User {
    fn from(n: UserNode) -> Self {
        User {
            id: n.id,
            name: n.name,
            email: n.email,
            display_name: n.display_name,
            active: n.active,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateNode {
    id: String,
    name: String,
    #[serde(rename = "type")]
    state_type: String,
    team: IdRef,
}

impl From<StateNode> for State {
    fn from(n: StateNode) -> Self {
        State {
            id: n.id,
            team_id: n.team.id,
            name: n.name,
            state_type: StateType::parse(&n.state_type).unwrap_or(StateType::Backlog),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelNode {
    id: String,
    name: String,
    color: Option<String>,
    description: Option<String>,
    team: Option<IdRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LabelNode {
    fn into_label(self, team_id: &str) -> Label {
        Label {
            id: self.id,
            team_id: self.team.map(|t| t.id).unwrap_or_else(|| team_id.to_string()),
            name: self.name,
            color: self.color.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    description: Option<String>,
    priority: Option<f64>,
    due_date: Option<NaiveDate>,
    estimate: Option<f64>,
    team: IdRef,
    state: IdRef,
    assignee: Option<IdRef>,
    creator: Option<IdRef>,
    project: Option<IdRef>,
    project_milestone: Option<IdRef>,
    cycle: Option<IdRef>,
    parent: Option<IdRef>,
    labels: Nodes<IdRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IssueNode> for Issue {
    fn from(n: IssueNode) -> Self {
        Issue {
            id: n.id,
            identifier: n.identifier,
            title: n.title,
            description: n.description.unwrap_or_default(),
            priority: n.priority.map(|p| p as u8).unwrap_or(0),
            due_date: n.due_date,
            estimate: n.estimate.map(|e| e as i64),
            team_id: n.team.id,
            state_id: n.state.id,
            assignee_id: n.assignee.map(|r| r.id),
            creator_id: n.creator.map(|r| r.id),
            project_id: n.project.map(|r| r.id),
            milestone_id: n.project_milestone.map(|r| r.id),
            cycle_id: n.cycle.map(|r| r.id),
            parent_id: n.parent.map(|r| r.id),
            label_ids: n.labels.nodes.into_iter().map(|r| r.id).collect(),
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

const ISSUE_FIELDS: &str = "id identifier title description priority dueDate estimate \
     team { id } state { id } assignee { id } creator { id } project { id } \
     projectMilestone { id } cycle { id } parent { id } labels { nodes { id } } \
     createdAt updatedAt";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    id: String,
    name: String,
    slug_id: Option<String>,
    description: Option<String>,
    state: Option<String>,
    start_date: Option<NaiveDate>,
    target_date: Option<NaiveDate>,
    lead: Option<IdRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectNode {
    fn into_project(self, team_id: &str) -> Project {
        Project {
            id: self.id,
            team_id: team_id.to_string(),
            name: self.name,
            slug: self.slug_id.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            start_date: self.start_date,
            target_date: self.target_date,
            lead_id: self.lead.map(|r| r.id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const PROJECT_FIELDS: &str = "id name slugId description state startDate targetDate \
     lead { id } createdAt updatedAt";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CycleNode {
    id: String,
    number: i64,
    name: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    #[serde(default)]
    issue_count_history: Vec<f64>,
    #[serde(default)]
    completed_issue_count_history: Vec<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CycleNode {
    fn into_cycle(self, team_id: &str) -> Cycle {
        Cycle {
            id: self.id,
            team_id: team_id.to_string(),
            number: self.number,
            name: self.name,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            issue_count_history: self.issue_count_history.iter().map(|v| *v as i64).collect(),
            completed_count_history: self
                .completed_issue_count_history
                .iter()
                .map(|v| *v as i64)
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    body: String,
    user: Option<IdRef>,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommentNode {
    fn into_comment(self, issue_id: &str) -> Comment {
        Comment {
            id: self.id,
            issue_id: issue_id.to_string(),
            body: self.body,
            author_id: self.user.map(|r| r.id),
            edited_at: self.edited_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentNode {
    id: String,
    title: String,
    slug_id: Option<String>,
    content: Option<String>,
    icon: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentNode {
    fn into_document(self, scope: &DocScope) -> Document {
        Document {
            id: self.id,
            scope: scope.clone(),
            title: self.title,
            slug: self.slug_id,
            content: self.content.unwrap_or_default(),
            icon: self.icon,
            color: self.color,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const DOCUMENT_FIELDS: &str = "id title slugId content icon color createdAt updatedAt";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneNode {
    id: String,
    name: String,
    description: Option<String>,
    target_date: Option<NaiveDate>,
    sort_order: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MilestoneNode {
    fn into_milestone(self, project_id: &str) -> Milestone {
        Milestone {
            id: self.id,
            project_id: project_id.to_string(),
            name: self.name,
            description: self.description.unwrap_or_default(),
            target_date: self.target_date,
            sort_order: self.sort_order.unwrap_or(0.0),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const MILESTONE_FIELDS: &str = "id name description targetDate sortOrder createdAt updatedAt";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNode {
    id: String,
    body: String,
    health: Option<String>,
    user: Option<IdRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UpdateNode {
    fn into_update(self, parent: &UpdateParent) -> Update {
        Update {
            id: self.id,
            parent: parent.clone(),
            body: self.body,
            health: self
                .health
                .as_deref()
                .and_then(Health::parse)
                .unwrap_or(Health::OnTrack),
            author_id: self.user.map(|r| r.id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const UPDATE_FIELDS: &str = "id body health user { id } createdAt updatedAt";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiativeNode {
    id: String,
    name: String,
    slug_id: Option<String>,
    status: Option<String>,
    color: Option<String>,
    icon: Option<String>,
    target_date: Option<NaiveDate>,
    owner: Option<IdRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InitiativeNode> for Initiative {
    fn from(n: InitiativeNode) -> Self {
        Initiative {
            id: n.id,
            name: n.name,
            slug: n.slug_id.unwrap_or_default(),
            status: n.status.unwrap_or_default(),
            color: n.color,
            icon: n.icon,
            target_date: n.target_date,
            owner_id: n.owner.map(|r| r.id),
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentNode {
    id: String,
    title: String,
    subtitle: Option<String>,
    url: String,
    source_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttachmentNode {
    fn into_attachment(self, issue_id: &str) -> Attachment {
        Attachment {
            id: self.id,
            issue_id: issue_id.to_string(),
            title: self.title,
            url: self.url,
            subtitle: self.subtitle,
            source_type: self.source_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationNode {
    id: String,
    #[serde(rename = "type")]
    relation_type: String,
    issue: IdRef,
    related_issue: IdRef,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RelationNode> for Relation {
    fn from(n: RelationNode) -> Self {
        Relation {
            id: n.id,
            issue_id: n.issue.id,
            related_issue_id: n.related_issue.id,
            relation_type: RelationType::parse(&n.relation_type).unwrap_or(RelationType::Related),
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

const RELATION_FIELDS: &str =
    "id type issue { id } relatedIssue { id } createdAt updatedAt";

/// Embedded upload links extracted from an issue description.
fn embedded_files_from_description(
    issue_id: &str,
    description: &str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Vec<EmbeddedFile> {
    let mut files = Vec::new();
    for m in UPLOAD_URL.find_iter(description) {
        let raw = m.as_str();
        let Ok(parsed) = url::Url::parse(raw) else { continue };
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let filename = segments.last().copied().unwrap_or("file").to_string();
        // The path segment before the filename is the upload's stable id.
        let file_id = if segments.len() >= 2 {
            segments[segments.len() - 2].to_string()
        } else {
            filename.clone()
        };
        files.push(EmbeddedFile {
            id: file_id,
            issue_id: issue_id.to_string(),
            filename,
            url: raw.to_string(),
            size: 0,
            cache_path: None,
            created_at,
            updated_at,
        });
    }
    files
}

// --- Backend impl ----------------------------------------------------------

#[async_trait]
impl Backend for HttpBackend {
    async fn viewer(&self, ctx: OpCtx) -> ApiResult<User> {
        let query = "query { viewer { id name email displayName active createdAt updatedAt } }";
        let data = self.post(ctx, "viewer", query, json!({})).await?;
        Ok(Self::pluck::<UserNode>(data, &["viewer"])?.into())
    }

    async fn teams(&self, ctx: OpCtx) -> ApiResult<Vec<Team>> {
        let query = "query { teams { nodes { id key name icon createdAt updatedAt } } }";
        let data = self.post(ctx, "teams", query, json!({})).await?;
        let nodes: Nodes<TeamNode> = Self::pluck(data, &["teams"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn users(&self, ctx: OpCtx) -> ApiResult<Vec<User>> {
        let query =
            "query { users { nodes { id name email displayName active createdAt updatedAt } } }";
        let data = self.post(ctx, "users", query, json!({})).await?;
        let nodes: Nodes<UserNode> = Self::pluck(data, &["users"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn team_states(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<State>> {
        let query = "query($id: String!) { team(id: $id) { states { nodes \
                     { id name type team { id } } } } }";
        let data = self.post(ctx, "team_states", query, json!({ "id": team_id })).await?;
        let nodes: Nodes<StateNode> = Self::pluck(data, &["team", "states"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn team_labels(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Label>> {
        let query = "query($id: String!) { team(id: $id) { labels { nodes \
                     { id name color description team { id } createdAt updatedAt } } } }";
        let data = self.post(ctx, "team_labels", query, json!({ "id": team_id })).await?;
        let nodes: Nodes<LabelNode> = Self::pluck(data, &["team", "labels"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_label(team_id)).collect())
    }

    async fn team_issues(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Issue>> {
        let query = format!(
            "query($id: String!) {{ team(id: $id) {{ issues(first: 250) {{ nodes \
             {{ {ISSUE_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "team_issues", &query, json!({ "id": team_id })).await?;
        let nodes: Nodes<IssueNode> = Self::pluck(data, &["team", "issues"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn issue_by_identifier(&self, ctx: OpCtx, identifier: &str) -> ApiResult<Option<Issue>> {
        let query =
            format!("query($id: String!) {{ issue(id: $id) {{ {ISSUE_FIELDS} }} }}");
        let data = match self.post(ctx, "issue", &query, json!({ "id": identifier })).await {
            Ok(data) => data,
            // The backend reports an unknown identifier as an entity error.
            Err(ApiError::Backend(msg)) if msg.contains("not found") => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Self::pluck_opt::<IssueNode>(data, &["issue"])?.map(Into::into))
    }

    async fn issues_assigned(&self, ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>> {
        let query = format!(
            "query($id: String!) {{ user(id: $id) {{ assignedIssues(first: 250) {{ nodes \
             {{ {ISSUE_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "issues_assigned", &query, json!({ "id": user_id })).await?;
        let nodes: Nodes<IssueNode> = Self::pluck(data, &["user", "assignedIssues"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn issues_created(&self, ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>> {
        let query = format!(
            "query($id: String!) {{ user(id: $id) {{ createdIssues(first: 250) {{ nodes \
             {{ {ISSUE_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "issues_created", &query, json!({ "id": user_id })).await?;
        let nodes: Nodes<IssueNode> = Self::pluck(data, &["user", "createdIssues"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn project_issues(&self, ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Issue>> {
        let query = format!(
            "query($id: String!) {{ project(id: $id) {{ issues(first: 250) {{ nodes \
             {{ {ISSUE_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "project_issues", &query, json!({ "id": project_id })).await?;
        let nodes: Nodes<IssueNode> = Self::pluck(data, &["project", "issues"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn team_projects(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Project>> {
        let query = format!(
            "query($id: String!) {{ team(id: $id) {{ projects {{ nodes \
             {{ {PROJECT_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "team_projects", &query, json!({ "id": team_id })).await?;
        let nodes: Nodes<ProjectNode> = Self::pluck(data, &["team", "projects"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_project(team_id)).collect())
    }

    async fn team_cycles(&self, ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Cycle>> {
        let query = "query($id: String!) { team(id: $id) { cycles { nodes \
                     { id number name startsAt endsAt issueCountHistory \
                     completedIssueCountHistory createdAt updatedAt } } } }";
        let data = self.post(ctx, "team_cycles", query, json!({ "id": team_id })).await?;
        let nodes: Nodes<CycleNode> = Self::pluck(data, &["team", "cycles"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_cycle(team_id)).collect())
    }

    async fn issue_comments(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Comment>> {
        let query = "query($id: String!) { issue(id: $id) { comments { nodes \
                     { id body user { id } editedAt createdAt updatedAt } } } }";
        let data = self.post(ctx, "issue_comments", query, json!({ "id": issue_id })).await?;
        let nodes: Nodes<CommentNode> = Self::pluck(data, &["issue", "comments"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_comment(issue_id)).collect())
    }

    async fn documents(&self, ctx: OpCtx, scope: &DocScope) -> ApiResult<Vec<Document>> {
        let filter = match scope {
            DocScope::Team(id) => json!({ "team": { "id": { "eq": id } } }),
            DocScope::Issue(id) => json!({ "issue": { "id": { "eq": id } } }),
            DocScope::Project(id) => json!({ "project": { "id": { "eq": id } } }),
        };
        let query = format!(
            "query($filter: DocumentFilter) {{ documents(filter: $filter) {{ nodes \
             {{ {DOCUMENT_FIELDS} }} }} }}"
        );
        let data = self.post(ctx, "documents", &query, json!({ "filter": filter })).await?;
        let nodes: Nodes<DocumentNode> = Self::pluck(data, &["documents"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_document(scope)).collect())
    }

    async fn project_milestones(&self, ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Milestone>> {
        let query = format!(
            "query($id: String!) {{ project(id: $id) {{ projectMilestones {{ nodes \
             {{ {MILESTONE_FIELDS} }} }} }} }}"
        );
        let data = self
            .post(ctx, "project_milestones", &query, json!({ "id": project_id }))
            .await?;
        let nodes: Nodes<MilestoneNode> = Self::pluck(data, &["project", "projectMilestones"])?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_milestone(project_id)).collect())
    }

    async fn updates(&self, ctx: OpCtx, parent: &UpdateParent) -> ApiResult<Vec<Update>> {
        let (query, id, path): (String, &str, [&str; 2]) = match parent {
            UpdateParent::Project(id) => (
                format!(
                    "query($id: String!) {{ project(id: $id) {{ projectUpdates {{ nodes \
                     {{ {UPDATE_FIELDS} }} }} }} }}"
                ),
                id,
                ["project", "projectUpdates"],
            ),
            UpdateParent::Initiative(id) => (
                format!(
                    "query($id: String!) {{ initiative(id: $id) {{ initiativeUpdates {{ nodes \
                     {{ {UPDATE_FIELDS} }} }} }} }}"
                ),
                id,
                ["initiative", "initiativeUpdates"],
            ),
        };
        let data = self.post(ctx, "updates", &query, json!({ "id": id })).await?;
        let nodes: Nodes<UpdateNode> = Self::pluck(data, &path)?;
        Ok(nodes.nodes.into_iter().map(|n| n.into_update(parent)).collect())
    }

    async fn initiatives(&self, ctx: OpCtx) -> ApiResult<Vec<Initiative>> {
        let query = "query { initiatives { nodes { id name slugId status color icon \
                     targetDate owner { id } createdAt updatedAt } } }";
        let data = self.post(ctx, "initiatives", query, json!({})).await?;
        let nodes: Nodes<InitiativeNode> = Self::pluck(data, &["initiatives"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn initiative_projects(
        &self,
        ctx: OpCtx,
        initiative_id: &str,
    ) -> ApiResult<Vec<Project>> {
        let query = format!(
            "query($id: String!) {{ initiative(id: $id) {{ projects {{ nodes \
             {{ {PROJECT_FIELDS} team {{ id }} }} }} }} }}"
        );
        let data = self
            .post(ctx, "initiative_projects", &query, json!({ "id": initiative_id }))
            .await?;

        #[derive(Deserialize)]
        struct ProjectWithTeam {
            #[serde(flatten)]
            project: ProjectNode,
            team: Option<IdRef>,
        }
        let nodes: Nodes<ProjectWithTeam> = Self::pluck(data, &["initiative", "projects"])?;
        Ok(nodes
            .nodes
            .into_iter()
            .map(|n| {
                let team_id = n.team.map(|t| t.id).unwrap_or_default();
                n.project.into_project(&team_id)
            })
            .collect())
    }

    async fn issue_attachments(
        &self,
        ctx: OpCtx,
        issue_id: &str,
    ) -> ApiResult<(Vec<Attachment>, Vec<EmbeddedFile>)> {
        let query = "query($id: String!) { issue(id: $id) { description createdAt updatedAt \
                     attachments { nodes { id title subtitle url sourceType \
                     createdAt updatedAt } } } }";
        let data = self.post(ctx, "issue_attachments", query, json!({ "id": issue_id })).await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct IssueAttachments {
            description: Option<String>,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            attachments: Nodes<AttachmentNode>,
        }
        let node: IssueAttachments = Self::pluck(data, &["issue"])?;
        let files = embedded_files_from_description(
            issue_id,
            node.description.as_deref().unwrap_or(""),
            node.created_at,
            node.updated_at,
        );
        let attachments = node
            .attachments
            .nodes
            .into_iter()
            .map(|n| n.into_attachment(issue_id))
            .collect();
        Ok((attachments, files))
    }

    async fn issue_relations(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Relation>> {
        let query = format!(
            "query($id: String!) {{ issue(id: $id) {{ relations {{ nodes \
             {{ {RELATION_FIELDS} }} }} }} }}"
        );
        let data = self.post(ctx, "issue_relations", &query, json!({ "id": issue_id })).await?;
        let nodes: Nodes<RelationNode> = Self::pluck(data, &["issue", "relations"])?;
        Ok(nodes.nodes.into_iter().map(Into::into).collect())
    }

    async fn download(&self, ctx: OpCtx, url: &str) -> ApiResult<Bytes> {
        self.bump("download");
        if ctx.expired() {
            return Err(ApiError::Timeout);
        }
        let send = self.client.get(url).header("Authorization", &self.api_key).send();
        let response = tokio::time::timeout(ctx.remaining(), send)
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Backend(format!("download status {}", response.status())));
        }
        tokio::time::timeout(ctx.remaining(), response.bytes())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn create_issue(&self, ctx: OpCtx, team_id: &str, title: &str) -> ApiResult<Issue> {
        let query = format!(
            "mutation($input: IssueCreateInput!) {{ issueCreate(input: $input) \
             {{ success issue {{ {ISSUE_FIELDS} }} }} }}"
        );
        let vars = json!({ "input": { "teamId": team_id, "title": title } });
        let data = self.post(ctx, "create_issue", &query, vars).await?;
        Ok(Self::pluck::<IssueNode>(data, &["issueCreate", "issue"])?.into())
    }

    async fn update_issue(
        &self,
        ctx: OpCtx,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> ApiResult<Issue> {
        // Translate the engine's minimal payload keys into the backend's
        // update-input field names.
        let mut input = serde_json::Map::new();
        for (key, value) in patch.as_map() {
            let wire = match key.as_str() {
                "title" => "title",
                "description" => "description",
                "status" => "stateId",
                "assignee" => "assigneeId",
                "priority" => "priority",
                "labels" => "labelIds",
                "removed_labels" => "removedLabelIds",
                "due_date" => "dueDate",
                "estimate" => "estimate",
                "parent" => "parentId",
                "project" => "projectId",
                "milestone" => "projectMilestoneId",
                "cycle" => "cycleId",
                other => return Err(ApiError::Backend(format!("unknown patch key `{other}`"))),
            };
            input.insert(wire.to_string(), value.clone());
        }
        let query = format!(
            "mutation($id: String!, $input: IssueUpdateInput!) {{ issueUpdate(id: $id, \
             input: $input) {{ success issue {{ {ISSUE_FIELDS} }} }} }}"
        );
        let vars = json!({ "id": issue_id, "input": Value::Object(input) });
        let data = self.post(ctx, "update_issue", &query, vars).await?;
        Ok(Self::pluck::<IssueNode>(data, &["issueUpdate", "issue"])?.into())
    }

    async fn archive_issue(&self, ctx: OpCtx, issue_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { issueArchive(id: $id) { success } }";
        self.post(ctx, "archive_issue", query, json!({ "id": issue_id })).await?;
        Ok(())
    }

    async fn create_comment(&self, ctx: OpCtx, issue_id: &str, body: &str) -> ApiResult<Comment> {
        let query = "mutation($input: CommentCreateInput!) { commentCreate(input: $input) \
                     { success comment { id body user { id } editedAt createdAt updatedAt } } }";
        let vars = json!({ "input": { "issueId": issue_id, "body": body } });
        let data = self.post(ctx, "create_comment", query, vars).await?;
        let node: CommentNode = Self::pluck(data, &["commentCreate", "comment"])?;
        Ok(node.into_comment(issue_id))
    }

    async fn delete_comment(&self, ctx: OpCtx, comment_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { commentDelete(id: $id) { success } }";
        self.post(ctx, "delete_comment", query, json!({ "id": comment_id })).await?;
        Ok(())
    }

    async fn create_document(
        &self,
        ctx: OpCtx,
        scope: &DocScope,
        title: &str,
        content: &str,
    ) -> ApiResult<Document> {
        let mut input = serde_json::Map::new();
        input.insert("title".into(), json!(title));
        input.insert("content".into(), json!(content));
        match scope {
            DocScope::Team(id) => input.insert("teamId".into(), json!(id)),
            DocScope::Issue(id) => input.insert("issueId".into(), json!(id)),
            DocScope::Project(id) => input.insert("projectId".into(), json!(id)),
        };
        let query = format!(
            "mutation($input: DocumentCreateInput!) {{ documentCreate(input: $input) \
             {{ success document {{ {DOCUMENT_FIELDS} }} }} }}"
        );
        let data = self
            .post(ctx, "create_document", &query, json!({ "input": Value::Object(input) }))
            .await?;
        let node: DocumentNode = Self::pluck(data, &["documentCreate", "document"])?;
        Ok(node.into_document(scope))
    }

    async fn update_document(
        &self,
        ctx: OpCtx,
        doc_id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> ApiResult<Document> {
        let mut input = serde_json::Map::new();
        if let Some(title) = title {
            input.insert("title".into(), json!(title));
        }
        if let Some(content) = content {
            input.insert("content".into(), json!(content));
        }
        let query = format!(
            "mutation($id: String!, $input: DocumentUpdateInput!) {{ documentUpdate(id: $id, \
             input: $input) {{ success document {{ {DOCUMENT_FIELDS} }} }} }}"
        );
        let vars = json!({ "id": doc_id, "input": Value::Object(input) });
        let data = self.post(ctx, "update_document", &query, vars).await?;
        let node: DocumentNode = Self::pluck(data, &["documentUpdate", "document"])?;
        // The caller patches the scope back in; the wire node has no scope.
        Ok(node.into_document(&DocScope::Issue(String::new())))
    }

    async fn delete_document(&self, ctx: OpCtx, doc_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { documentDelete(id: $id) { success } }";
        self.post(ctx, "delete_document", query, json!({ "id": doc_id })).await?;
        Ok(())
    }

    async fn create_label(
        &self,
        ctx: OpCtx,
        team_id: &str,
        name: &str,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label> {
        let mut input = serde_json::Map::new();
        input.insert("teamId".into(), json!(team_id));
        input.insert("name".into(), json!(name));
        if let Some(color) = color {
            input.insert("color".into(), json!(color));
        }
        if let Some(description) = description {
            input.insert("description".into(), json!(description));
        }
        let query = "mutation($input: IssueLabelCreateInput!) { issueLabelCreate(input: $input) \
                     { success issueLabel { id name color description team { id } \
                     createdAt updatedAt } } }";
        let data = self
            .post(ctx, "create_label", query, json!({ "input": Value::Object(input) }))
            .await?;
        let node: LabelNode = Self::pluck(data, &["issueLabelCreate", "issueLabel"])?;
        Ok(node.into_label(team_id))
    }

    async fn update_label(
        &self,
        ctx: OpCtx,
        label_id: &str,
        name: Option<&str>,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label> {
        let mut input = serde_json::Map::new();
        if let Some(name) = name {
            input.insert("name".into(), json!(name));
        }
        if let Some(color) = color {
            input.insert("color".into(), json!(color));
        }
        if let Some(description) = description {
            input.insert("description".into(), json!(description));
        }
        let query = "mutation($id: String!, $input: IssueLabelUpdateInput!) \
                     { issueLabelUpdate(id: $id, input: $input) \
                     { success issueLabel { id name color description team { id } \
                     createdAt updatedAt } } }";
        let vars = json!({ "id": label_id, "input": Value::Object(input) });
        let data = self.post(ctx, "update_label", query, vars).await?;
        let node: LabelNode = Self::pluck(data, &["issueLabelUpdate", "issueLabel"])?;
        Ok(node.into_label(""))
    }

    async fn delete_label(&self, ctx: OpCtx, label_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { issueLabelDelete(id: $id) { success } }";
        self.post(ctx, "delete_label", query, json!({ "id": label_id })).await?;
        Ok(())
    }

    async fn create_milestone(
        &self,
        ctx: OpCtx,
        project_id: &str,
        name: &str,
        description: &str,
        target_date: Option<NaiveDate>,
    ) -> ApiResult<Milestone> {
        let mut input = serde_json::Map::new();
        input.insert("projectId".into(), json!(project_id));
        input.insert("name".into(), json!(name));
        input.insert("description".into(), json!(description));
        if let Some(date) = target_date {
            input.insert("targetDate".into(), json!(date.to_string()));
        }
        let query = format!(
            "mutation($input: ProjectMilestoneCreateInput!) {{ projectMilestoneCreate(input: \
             $input) {{ success projectMilestone {{ {MILESTONE_FIELDS} }} }} }}"
        );
        let data = self
            .post(ctx, "create_milestone", &query, json!({ "input": Value::Object(input) }))
            .await?;
        let node: MilestoneNode =
            Self::pluck(data, &["projectMilestoneCreate", "projectMilestone"])?;
        Ok(node.into_milestone(project_id))
    }

    async fn create_update(
        &self,
        ctx: OpCtx,
        parent: &UpdateParent,
        body: &str,
        health: Health,
    ) -> ApiResult<Update> {
        let (query, vars, path): (String, Value, [&str; 2]) = match parent {
            UpdateParent::Project(id) => (
                format!(
                    "mutation($input: ProjectUpdateCreateInput!) {{ projectUpdateCreate(input: \
                     $input) {{ success projectUpdate {{ {UPDATE_FIELDS} }} }} }}"
                ),
                json!({ "input": { "projectId": id, "body": body, "health": health.as_str() } }),
                ["projectUpdateCreate", "projectUpdate"],
            ),
            UpdateParent::Initiative(id) => (
                format!(
                    "mutation($input: InitiativeUpdateCreateInput!) {{ initiativeUpdateCreate(\
                     input: $input) {{ success initiativeUpdate {{ {UPDATE_FIELDS} }} }} }}"
                ),
                json!({ "input": { "initiativeId": id, "body": body, "health": health.as_str() } }),
                ["initiativeUpdateCreate", "initiativeUpdate"],
            ),
        };
        let data = self.post(ctx, "create_update", &query, vars).await?;
        let node: UpdateNode = Self::pluck(data, &path)?;
        Ok(node.into_update(parent))
    }

    async fn create_attachment(
        &self,
        ctx: OpCtx,
        issue_id: &str,
        url: &str,
        title: Option<&str>,
    ) -> ApiResult<Attachment> {
        let title = title.unwrap_or(url);
        let query = "mutation($input: AttachmentCreateInput!) { attachmentCreate(input: $input) \
                     { success attachment { id title subtitle url sourceType \
                     createdAt updatedAt } } }";
        let vars = json!({ "input": { "issueId": issue_id, "url": url, "title": title } });
        let data = self.post(ctx, "create_attachment", query, vars).await?;
        let node: AttachmentNode = Self::pluck(data, &["attachmentCreate", "attachment"])?;
        Ok(node.into_attachment(issue_id))
    }

    async fn delete_attachment(&self, ctx: OpCtx, attachment_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { attachmentDelete(id: $id) { success } }";
        self.post(ctx, "delete_attachment", query, json!({ "id": attachment_id })).await?;
        Ok(())
    }

    async fn create_relation(
        &self,
        ctx: OpCtx,
        issue_id: &str,
        related_issue_id: &str,
        relation_type: RelationType,
    ) -> ApiResult<Relation> {
        let query = format!(
            "mutation($input: IssueRelationCreateInput!) {{ issueRelationCreate(input: $input) \
             {{ success issueRelation {{ {RELATION_FIELDS} }} }} }}"
        );
        let vars = json!({ "input": {
            "issueId": issue_id,
            "relatedIssueId": related_issue_id,
            "type": relation_type.as_str(),
        } });
        let data = self.post(ctx, "create_relation", &query, vars).await?;
        let node: RelationNode = Self::pluck(data, &["issueRelationCreate", "issueRelation"])?;
        Ok(node.into())
    }

    async fn delete_relation(&self, ctx: OpCtx, relation_id: &str) -> ApiResult<()> {
        let query = "mutation($id: String!) { issueRelationDelete(id: $id) { success } }";
        self.post(ctx, "delete_relation", query, json!({ "id": relation_id })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_files_are_extracted_with_stable_ids() {
        let description = "Screenshot: \
            ![shot](https://uploads.example.app/org-1/9f8e7d6c/screen.png) and \
            ![log](https://uploads.example.app/org-1/11aa22bb/run.log)";
        let now = Utc::now();
        let files = embedded_files_from_description("issue-1", description, now, now);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, "9f8e7d6c");
        assert_eq!(files[0].filename, "screen.png");
        assert_eq!(files[1].filename, "run.log");
        assert_eq!(files[0].size, 0);
    }

    #[test]
    fn plain_descriptions_carry_no_files() {
        let now = Utc::now();
        assert!(embedded_files_from_description("i", "no links here", now, now).is_empty());
    }
}
