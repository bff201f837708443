//! In-memory [`Backend`] double.
//!
//! Backs the engine-level test scenarios: records are seeded directly,
//! mutations are applied to the in-memory tables, and the last issue patch
//! is kept so tests can assert on the exact payload the write pipeline
//! emitted. `set_offline(true)` makes every call fail with a transport
//! error to exercise the dirty-buffer retry paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use super::{ApiError, ApiResult, Backend, IssuePatch, OpCtx};
use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Health, Initiative, Issue, Label,
    Milestone, Project, Relation, RelationType, State, StateType, Team, Update, UpdateParent, User,
};

#[derive(Default)]
struct FakeState {
    viewer_id: Option<String>,
    teams: Vec<Team>,
    users: Vec<User>,
    states: Vec<State>,
    labels: Vec<Label>,
    issues: Vec<Issue>,
    projects: Vec<Project>,
    cycles: Vec<Cycle>,
    comments: Vec<Comment>,
    documents: Vec<Document>,
    milestones: Vec<Milestone>,
    updates: Vec<Update>,
    initiatives: Vec<Initiative>,
    initiative_projects: HashMap<String, Vec<String>>,
    attachments: Vec<Attachment>,
    files: Vec<EmbeddedFile>,
    relations: Vec<Relation>,
    blobs: HashMap<String, Vec<u8>>,
    next_id: u64,
    next_issue_number: HashMap<String, i64>,
    clock: i64,
    offline: bool,
    last_issue_patch: Option<(String, IssuePatch)>,
}

impl FakeState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.clock)
    }

    fn check_online(&self) -> ApiResult<()> {
        if self.offline {
            Err(ApiError::Transport("backend offline".into()))
        } else {
            Ok(())
        }
    }
}

pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self { state: Mutex::new(FakeState::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// The patch submitted by the most recent `update_issue` call.
    pub fn last_issue_patch(&self) -> Option<(String, IssuePatch)> {
        self.lock().last_issue_patch.clone()
    }

    // --- Seeding ------------------------------------------------------

    pub fn add_team(&self, key: &str, name: &str) -> Team {
        let mut s = self.lock();
        let now = s.tick();
        let team = Team {
            id: s.fresh_id("team"),
            key: key.to_string(),
            name: name.to_string(),
            icon: None,
            created_at: now,
            updated_at: now,
        };
        s.teams.push(team.clone());
        team
    }

    pub fn add_user(&self, name: &str, email: &str, display_name: &str) -> User {
        let mut s = self.lock();
        let now = s.tick();
        let user = User {
            id: s.fresh_id("user"),
            name: name.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        s.users.push(user.clone());
        user
    }

    pub fn set_viewer(&self, user_id: &str) {
        self.lock().viewer_id = Some(user_id.to_string());
    }

    pub fn add_state(&self, team_id: &str, name: &str, state_type: StateType) -> State {
        let mut s = self.lock();
        let state = State {
            id: s.fresh_id("state"),
            team_id: team_id.to_string(),
            name: name.to_string(),
            state_type,
        };
        s.states.push(state.clone());
        state
    }

    pub fn add_label(&self, team_id: &str, name: &str, color: &str) -> Label {
        let mut s = self.lock();
        let now = s.tick();
        let label = Label {
            id: s.fresh_id("label"),
            team_id: team_id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        };
        s.labels.push(label.clone());
        label
    }

    pub fn add_issue(&self, team: &Team, state_id: &str, title: &str) -> Issue {
        let mut s = self.lock();
        let number = s.next_issue_number.entry(team.id.clone()).or_insert(0);
        *number += 1;
        let identifier = format!("{}-{}", team.key, number);
        let now = s.tick();
        let issue = Issue {
            id: s.fresh_id("issue"),
            identifier,
            title: title.to_string(),
            description: String::new(),
            priority: 0,
            due_date: None,
            estimate: None,
            team_id: team.id.clone(),
            state_id: state_id.to_string(),
            assignee_id: None,
            creator_id: s.viewer_id.clone(),
            project_id: None,
            milestone_id: None,
            cycle_id: None,
            parent_id: None,
            label_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        s.issues.push(issue.clone());
        issue
    }

    /// Replace a seeded issue wholesale (tests adjusting fields directly).
    pub fn put_issue(&self, issue: Issue) {
        let mut s = self.lock();
        if let Some(slot) = s.issues.iter_mut().find(|i| i.id == issue.id) {
            *slot = issue;
        } else {
            s.issues.push(issue);
        }
    }

    pub fn add_project(&self, team_id: &str, name: &str, slug: &str) -> Project {
        let mut s = self.lock();
        let now = s.tick();
        let project = Project {
            id: s.fresh_id("project"),
            team_id: team_id.to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: String::new(),
            state: "started".to_string(),
            start_date: None,
            target_date: None,
            lead_id: None,
            created_at: now,
            updated_at: now,
        };
        s.projects.push(project.clone());
        project
    }

    pub fn add_cycle(
        &self,
        team_id: &str,
        number: i64,
        name: Option<&str>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Cycle {
        let mut s = self.lock();
        let now = s.tick();
        let cycle = Cycle {
            id: s.fresh_id("cycle"),
            team_id: team_id.to_string(),
            number,
            name: name.map(String::from),
            starts_at,
            ends_at,
            issue_count_history: vec![0],
            completed_count_history: vec![0],
            created_at: now,
            updated_at: now,
        };
        s.cycles.push(cycle.clone());
        cycle
    }

    pub fn add_comment(&self, issue_id: &str, author_id: Option<&str>, body: &str) -> Comment {
        let mut s = self.lock();
        let now = s.tick();
        let comment = Comment {
            id: s.fresh_id("comment"),
            issue_id: issue_id.to_string(),
            body: body.to_string(),
            author_id: author_id.map(String::from),
            edited_at: None,
            created_at: now,
            updated_at: now,
        };
        s.comments.push(comment.clone());
        comment
    }

    pub fn add_document(&self, scope: DocScope, title: &str, content: &str) -> Document {
        let mut s = self.lock();
        let now = s.tick();
        let doc = Document {
            id: s.fresh_id("doc"),
            scope,
            title: title.to_string(),
            slug: None,
            content: content.to_string(),
            icon: None,
            color: None,
            created_at: now,
            updated_at: now,
        };
        s.documents.push(doc.clone());
        doc
    }

    pub fn add_initiative(&self, name: &str, slug: &str) -> Initiative {
        let mut s = self.lock();
        let now = s.tick();
        let initiative = Initiative {
            id: s.fresh_id("initiative"),
            name: name.to_string(),
            slug: slug.to_string(),
            status: "Active".to_string(),
            color: None,
            icon: None,
            target_date: None,
            owner_id: None,
            created_at: now,
            updated_at: now,
        };
        s.initiatives.push(initiative.clone());
        initiative
    }

    pub fn link_initiative_project(&self, initiative_id: &str, project_id: &str) {
        self.lock()
            .initiative_projects
            .entry(initiative_id.to_string())
            .or_default()
            .push(project_id.to_string());
    }

    pub fn add_attachment(&self, issue_id: &str, title: &str, url: &str) -> Attachment {
        let mut s = self.lock();
        let now = s.tick();
        let attachment = Attachment {
            id: s.fresh_id("attachment"),
            issue_id: issue_id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            subtitle: None,
            source_type: None,
            created_at: now,
            updated_at: now,
        };
        s.attachments.push(attachment.clone());
        attachment
    }

    pub fn add_file(&self, issue_id: &str, filename: &str, url: &str, size: u64) -> EmbeddedFile {
        let mut s = self.lock();
        let now = s.tick();
        let file = EmbeddedFile {
            id: s.fresh_id("file"),
            issue_id: issue_id.to_string(),
            filename: filename.to_string(),
            url: url.to_string(),
            size,
            cache_path: None,
            created_at: now,
            updated_at: now,
        };
        s.files.push(file.clone());
        file
    }

    pub fn add_blob(&self, url: &str, bytes: &[u8]) {
        self.lock().blobs.insert(url.to_string(), bytes.to_vec());
    }

    pub fn comment_count(&self, issue_id: &str) -> usize {
        self.lock().comments.iter().filter(|c| c.issue_id == issue_id).count()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn viewer(&self, _ctx: OpCtx) -> ApiResult<User> {
        let s = self.lock();
        s.check_online()?;
        let id = s
            .viewer_id
            .clone()
            .ok_or_else(|| ApiError::Backend("no viewer configured".into()))?;
        s.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Backend("viewer not among users".into()))
    }

    async fn teams(&self, _ctx: OpCtx) -> ApiResult<Vec<Team>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.teams.clone())
    }

    async fn users(&self, _ctx: OpCtx) -> ApiResult<Vec<User>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.users.clone())
    }

    async fn team_states(&self, _ctx: OpCtx, team_id: &str) -> ApiResult<Vec<State>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.states.iter().filter(|x| x.team_id == team_id).cloned().collect())
    }

    async fn team_labels(&self, _ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Label>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.labels.iter().filter(|x| x.team_id == team_id).cloned().collect())
    }

    async fn team_issues(&self, _ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Issue>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.issues.iter().filter(|x| x.team_id == team_id).cloned().collect())
    }

    async fn issue_by_identifier(&self, _ctx: OpCtx, identifier: &str) -> ApiResult<Option<Issue>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.issues.iter().find(|x| x.identifier == identifier).cloned())
    }

    async fn issues_assigned(&self, _ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.issues
            .iter()
            .filter(|x| x.assignee_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn issues_created(&self, _ctx: OpCtx, user_id: &str) -> ApiResult<Vec<Issue>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.issues
            .iter()
            .filter(|x| x.creator_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn project_issues(&self, _ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Issue>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.issues
            .iter()
            .filter(|x| x.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }

    async fn team_projects(&self, _ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Project>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.projects.iter().filter(|x| x.team_id == team_id).cloned().collect())
    }

    async fn team_cycles(&self, _ctx: OpCtx, team_id: &str) -> ApiResult<Vec<Cycle>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.cycles.iter().filter(|x| x.team_id == team_id).cloned().collect())
    }

    async fn issue_comments(&self, _ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Comment>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.comments.iter().filter(|x| x.issue_id == issue_id).cloned().collect())
    }

    async fn documents(&self, _ctx: OpCtx, scope: &DocScope) -> ApiResult<Vec<Document>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.documents.iter().filter(|x| &x.scope == scope).cloned().collect())
    }

    async fn project_milestones(&self, _ctx: OpCtx, project_id: &str) -> ApiResult<Vec<Milestone>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.milestones.iter().filter(|x| x.project_id == project_id).cloned().collect())
    }

    async fn updates(&self, _ctx: OpCtx, parent: &UpdateParent) -> ApiResult<Vec<Update>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.updates.iter().filter(|x| &x.parent == parent).cloned().collect())
    }

    async fn initiatives(&self, _ctx: OpCtx) -> ApiResult<Vec<Initiative>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.initiatives.clone())
    }

    async fn initiative_projects(
        &self,
        _ctx: OpCtx,
        initiative_id: &str,
    ) -> ApiResult<Vec<Project>> {
        let s = self.lock();
        s.check_online()?;
        let ids = s.initiative_projects.get(initiative_id).cloned().unwrap_or_default();
        Ok(s.projects.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn issue_attachments(
        &self,
        _ctx: OpCtx,
        issue_id: &str,
    ) -> ApiResult<(Vec<Attachment>, Vec<EmbeddedFile>)> {
        let s = self.lock();
        s.check_online()?;
        let attachments = s.attachments.iter().filter(|x| x.issue_id == issue_id).cloned().collect();
        let files = s.files.iter().filter(|x| x.issue_id == issue_id).cloned().collect();
        Ok((attachments, files))
    }

    async fn issue_relations(&self, _ctx: OpCtx, issue_id: &str) -> ApiResult<Vec<Relation>> {
        let s = self.lock();
        s.check_online()?;
        Ok(s.relations.iter().filter(|x| x.issue_id == issue_id).cloned().collect())
    }

    async fn download(&self, _ctx: OpCtx, url: &str) -> ApiResult<Bytes> {
        let s = self.lock();
        s.check_online()?;
        s.blobs
            .get(url)
            .map(|b| Bytes::from(b.clone()))
            .ok_or_else(|| ApiError::Backend(format!("no blob at {url}")))
    }

    async fn create_issue(&self, _ctx: OpCtx, team_id: &str, title: &str) -> ApiResult<Issue> {
        let mut s = self.lock();
        s.check_online()?;
        let team = s
            .teams
            .iter()
            .find(|t| t.id == team_id)
            .cloned()
            .ok_or_else(|| ApiError::Backend("unknown team".into()))?;
        // New issues land in the team's lowest-ranked workflow state.
        let state_id = s
            .states
            .iter()
            .filter(|x| x.team_id == team_id)
            .min_by_key(|x| x.state_type.rank())
            .map(|x| x.id.clone())
            .ok_or_else(|| ApiError::Backend("team has no states".into()))?;
        let number = s.next_issue_number.entry(team.id.clone()).or_insert(0);
        *number += 1;
        let identifier = format!("{}-{}", team.key, number);
        let now = s.tick();
        let issue = Issue {
            id: s.fresh_id("issue"),
            identifier,
            title: title.to_string(),
            description: String::new(),
            priority: 0,
            due_date: None,
            estimate: None,
            team_id: team.id,
            state_id,
            assignee_id: None,
            creator_id: s.viewer_id.clone(),
            project_id: None,
            milestone_id: None,
            cycle_id: None,
            parent_id: None,
            label_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        s.issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        _ctx: OpCtx,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> ApiResult<Issue> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        s.last_issue_patch = Some((issue_id.to_string(), patch.clone()));
        let issue = s
            .issues
            .iter_mut()
            .find(|x| x.id == issue_id)
            .ok_or_else(|| ApiError::Backend("unknown issue".into()))?;

        let as_opt_string = |v: &serde_json::Value| v.as_str().map(String::from);
        for (key, value) in patch.as_map() {
            match key.as_str() {
                "title" => issue.title = value.as_str().unwrap_or_default().to_string(),
                "description" => issue.description = value.as_str().unwrap_or_default().to_string(),
                "status" => issue.state_id = value.as_str().unwrap_or_default().to_string(),
                "assignee" => issue.assignee_id = as_opt_string(value),
                "priority" => issue.priority = value.as_u64().unwrap_or(0) as u8,
                "labels" => {
                    let ids: Vec<String> = value
                        .as_array()
                        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default();
                    for id in ids {
                        if !issue.label_ids.contains(&id) {
                            issue.label_ids.push(id);
                        }
                    }
                }
                "removed_labels" => {
                    let ids: Vec<String> = value
                        .as_array()
                        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default();
                    issue.label_ids.retain(|id| !ids.contains(id));
                }
                "due_date" => {
                    issue.due_date = value.as_str().and_then(|s| s.parse::<NaiveDate>().ok())
                }
                "estimate" => issue.estimate = value.as_i64(),
                "parent" => issue.parent_id = as_opt_string(value),
                "project" => issue.project_id = as_opt_string(value),
                "milestone" => issue.milestone_id = as_opt_string(value),
                "cycle" => issue.cycle_id = as_opt_string(value),
                other => return Err(ApiError::Backend(format!("unknown patch key `{other}`"))),
            }
        }
        issue.updated_at = now;
        Ok(issue.clone())
    }

    async fn archive_issue(&self, _ctx: OpCtx, issue_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.issues.len();
        s.issues.retain(|x| x.id != issue_id);
        if s.issues.len() == before {
            return Err(ApiError::Backend("unknown issue".into()));
        }
        Ok(())
    }

    async fn create_comment(&self, _ctx: OpCtx, issue_id: &str, body: &str) -> ApiResult<Comment> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let comment = Comment {
            id: s.fresh_id("comment"),
            issue_id: issue_id.to_string(),
            body: body.to_string(),
            author_id: s.viewer_id.clone(),
            edited_at: None,
            created_at: now,
            updated_at: now,
        };
        s.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, _ctx: OpCtx, comment_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.comments.len();
        s.comments.retain(|x| x.id != comment_id);
        if s.comments.len() == before {
            return Err(ApiError::Backend("comment not found".into()));
        }
        Ok(())
    }

    async fn create_document(
        &self,
        _ctx: OpCtx,
        scope: &DocScope,
        title: &str,
        content: &str,
    ) -> ApiResult<Document> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let doc = Document {
            id: s.fresh_id("doc"),
            scope: scope.clone(),
            title: title.to_string(),
            slug: None,
            content: content.to_string(),
            icon: None,
            color: None,
            created_at: now,
            updated_at: now,
        };
        s.documents.push(doc.clone());
        Ok(doc)
    }

    async fn update_document(
        &self,
        _ctx: OpCtx,
        doc_id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> ApiResult<Document> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let doc = s
            .documents
            .iter_mut()
            .find(|x| x.id == doc_id)
            .ok_or_else(|| ApiError::Backend("document not found".into()))?;
        if let Some(title) = title {
            doc.title = title.to_string();
        }
        if let Some(content) = content {
            doc.content = content.to_string();
        }
        doc.updated_at = now;
        Ok(doc.clone())
    }

    async fn delete_document(&self, _ctx: OpCtx, doc_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.documents.len();
        s.documents.retain(|x| x.id != doc_id);
        if s.documents.len() == before {
            return Err(ApiError::Backend("document not found".into()));
        }
        Ok(())
    }

    async fn create_label(
        &self,
        _ctx: OpCtx,
        team_id: &str,
        name: &str,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let label = Label {
            id: s.fresh_id("label"),
            team_id: team_id.to_string(),
            name: name.to_string(),
            color: color.unwrap_or_default().to_string(),
            description: description.unwrap_or_default().to_string(),
            created_at: now,
            updated_at: now,
        };
        s.labels.push(label.clone());
        Ok(label)
    }

    async fn update_label(
        &self,
        _ctx: OpCtx,
        label_id: &str,
        name: Option<&str>,
        color: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Label> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let label = s
            .labels
            .iter_mut()
            .find(|x| x.id == label_id)
            .ok_or_else(|| ApiError::Backend("label not found".into()))?;
        if let Some(name) = name {
            label.name = name.to_string();
        }
        if let Some(color) = color {
            label.color = color.to_string();
        }
        if let Some(description) = description {
            label.description = description.to_string();
        }
        label.updated_at = now;
        Ok(label.clone())
    }

    async fn delete_label(&self, _ctx: OpCtx, label_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.labels.len();
        s.labels.retain(|x| x.id != label_id);
        if s.labels.len() == before {
            return Err(ApiError::Backend("label not found".into()));
        }
        Ok(())
    }

    async fn create_milestone(
        &self,
        _ctx: OpCtx,
        project_id: &str,
        name: &str,
        description: &str,
        target_date: Option<NaiveDate>,
    ) -> ApiResult<Milestone> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let sort_order = s.milestones.iter().filter(|m| m.project_id == project_id).count() as f64;
        let milestone = Milestone {
            id: s.fresh_id("milestone"),
            project_id: project_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            target_date,
            sort_order,
            created_at: now,
            updated_at: now,
        };
        s.milestones.push(milestone.clone());
        Ok(milestone)
    }

    async fn create_update(
        &self,
        _ctx: OpCtx,
        parent: &UpdateParent,
        body: &str,
        health: Health,
    ) -> ApiResult<Update> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let update = Update {
            id: s.fresh_id("update"),
            parent: parent.clone(),
            body: body.to_string(),
            health,
            author_id: s.viewer_id.clone(),
            created_at: now,
            updated_at: now,
        };
        s.updates.push(update.clone());
        Ok(update)
    }

    async fn create_attachment(
        &self,
        _ctx: OpCtx,
        issue_id: &str,
        url: &str,
        title: Option<&str>,
    ) -> ApiResult<Attachment> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let attachment = Attachment {
            id: s.fresh_id("attachment"),
            issue_id: issue_id.to_string(),
            title: title.unwrap_or(url).to_string(),
            url: url.to_string(),
            subtitle: None,
            source_type: None,
            created_at: now,
            updated_at: now,
        };
        s.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn delete_attachment(&self, _ctx: OpCtx, attachment_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.attachments.len();
        s.attachments.retain(|x| x.id != attachment_id);
        if s.attachments.len() == before {
            return Err(ApiError::Backend("attachment not found".into()));
        }
        Ok(())
    }

    async fn create_relation(
        &self,
        _ctx: OpCtx,
        issue_id: &str,
        related_issue_id: &str,
        relation_type: RelationType,
    ) -> ApiResult<Relation> {
        let mut s = self.lock();
        s.check_online()?;
        let now = s.tick();
        let relation = Relation {
            id: s.fresh_id("relation"),
            issue_id: issue_id.to_string(),
            related_issue_id: related_issue_id.to_string(),
            relation_type,
            created_at: now,
            updated_at: now,
        };
        s.relations.push(relation.clone());
        Ok(relation)
    }

    async fn delete_relation(&self, _ctx: OpCtx, relation_id: &str) -> ApiResult<()> {
        let mut s = self.lock();
        s.check_online()?;
        let before = s.relations.len();
        s.relations.retain(|x| x.id != relation_id);
        if s.relations.len() == before {
            return Err(ApiError::Backend("relation not found".into()));
        }
        Ok(())
    }
}
