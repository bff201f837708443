//! Repository: the read-only facade every node materialisation goes
//! through.
//!
//! Reads consult the local cache; a named query view that is stale (or has
//! never been fetched) is refetched from the backend, upserted, and marked
//! fresh before the select runs. Mutation paths invalidate views by name,
//! which simply drops the freshness entry so the next read refetches.
//!
//! The synchronous methods are for FUSE worker threads and bridge into the
//! async backend with `Handle::block_on`; the `refresh_*` methods are async
//! and are what the background refresher drives directly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::api::{Backend, OpCtx};
use crate::db::Cache;
use crate::error::{FsError, FsResult};
use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Initiative, Issue, Label,
    Milestone, Project, Relation, State, StateType, Team, Update, UpdateParent, User,
};

/// Named query views with independent freshness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    Teams,
    Users,
    Initiatives,
    TeamStates(String),
    TeamLabels(String),
    TeamIssues(String),
    TeamProjects(String),
    TeamCycles(String),
    IssueComments(String),
    Docs(String),
    ProjectMilestones(String),
    Updates(String),
    InitiativeProjects(String),
    IssueAttachments(String),
    IssueRelations(String),
    UserIssues(String),
    CreatedIssues(String),
    ProjectIssues(String),
}

/// Which of the viewer's issue listings is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MyFilter {
    Assigned,
    Created,
    Active,
}

impl MyFilter {
    pub fn dir_name(self) -> &'static str {
        match self {
            MyFilter::Assigned => "assigned",
            MyFilter::Created => "created",
            MyFilter::Active => "active",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "assigned" => Some(MyFilter::Assigned),
            "created" => Some(MyFilter::Created),
            "active" => Some(MyFilter::Active),
            _ => None,
        }
    }
}

pub struct Repository {
    cache: Arc<Cache>,
    backend: Arc<dyn Backend>,
    rt: tokio::runtime::Handle,
    ttl: Duration,
    fresh: Mutex<HashMap<View, Instant>>,
    viewer: OnceLock<User>,
}

impl Repository {
    pub fn new(
        cache: Arc<Cache>,
        backend: Arc<dyn Backend>,
        rt: tokio::runtime::Handle,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            backend,
            rt,
            ttl,
            fresh: Mutex::new(HashMap::new()),
            viewer: OnceLock::new(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn runtime(&self) -> &tokio::runtime::Handle {
        &self.rt
    }

    fn stale(&self, view: &View) -> bool {
        match self.fresh.lock() {
            Ok(fresh) => match fresh.get(view) {
                Some(at) => at.elapsed() >= self.ttl,
                None => true,
            },
            Err(_) => true,
        }
    }

    pub fn mark_fresh(&self, view: View) {
        if let Ok(mut fresh) = self.fresh.lock() {
            fresh.insert(view, Instant::now());
        }
    }

    /// Drop a view's freshness so the next read refetches it.
    pub fn invalidate(&self, view: &View) {
        debug!(?view, "invalidate view");
        if let Ok(mut fresh) = self.fresh.lock() {
            fresh.remove(view);
        }
    }

    fn block_on<T>(&self, fut: impl std::future::Future<Output = T> + Send) -> T {
        self.rt.block_on(fut)
    }

    // --- Async refreshers (shared with the background worker) ---------

    pub async fn refresh_teams(&self, ctx: OpCtx) -> FsResult<()> {
        let teams = self.backend.teams(ctx).await?;
        self.cache.replace_teams(&teams)?;
        self.mark_fresh(View::Teams);
        Ok(())
    }

    pub async fn refresh_users(&self, ctx: OpCtx) -> FsResult<()> {
        let users = self.backend.users(ctx).await?;
        self.cache.replace_users(&users)?;
        self.mark_fresh(View::Users);
        Ok(())
    }

    pub async fn refresh_team_issues(&self, ctx: OpCtx, team_id: &str) -> FsResult<()> {
        let issues = self.backend.team_issues(ctx, team_id).await?;
        self.cache.replace_team_issues(team_id, &issues)?;
        self.mark_fresh(View::TeamIssues(team_id.to_string()));
        Ok(())
    }

    pub async fn refresh_initiatives(&self, ctx: OpCtx) -> FsResult<()> {
        let initiatives = self.backend.initiatives(ctx).await?;
        self.cache.replace_initiatives(&initiatives)?;
        self.mark_fresh(View::Initiatives);
        Ok(())
    }

    // --- Teams and users ----------------------------------------------

    pub fn teams(&self, ctx: OpCtx) -> FsResult<Vec<Team>> {
        if self.stale(&View::Teams) {
            self.block_on(self.refresh_teams(ctx))?;
        }
        Ok(self.cache.teams()?)
    }

    pub fn team_by_key(&self, ctx: OpCtx, key: &str) -> FsResult<Option<Team>> {
        if let Some(team) = self.cache.team_by_key(key)? {
            return Ok(Some(team));
        }
        self.block_on(self.refresh_teams(ctx))?;
        Ok(self.cache.team_by_key(key)?)
    }

    pub fn team_by_id(&self, ctx: OpCtx, team_id: &str) -> FsResult<Option<Team>> {
        if let Some(team) = self.cache.team_by_id(team_id)? {
            return Ok(Some(team));
        }
        self.block_on(self.refresh_teams(ctx))?;
        Ok(self.cache.team_by_id(team_id)?)
    }

    pub fn users(&self, ctx: OpCtx) -> FsResult<Vec<User>> {
        if self.stale(&View::Users) {
            self.block_on(self.refresh_users(ctx))?;
        }
        Ok(self.cache.users()?)
    }

    pub fn user_by_id(&self, ctx: OpCtx, user_id: &str) -> FsResult<Option<User>> {
        if let Some(user) = self.cache.user_by_id(user_id)? {
            return Ok(Some(user));
        }
        self.block_on(self.refresh_users(ctx))?;
        Ok(self.cache.user_by_id(user_id)?)
    }

    /// The authenticated user; fetched once per mount.
    pub fn viewer(&self, ctx: OpCtx) -> FsResult<User> {
        if let Some(user) = self.viewer.get() {
            return Ok(user.clone());
        }
        let backend = self.backend.clone();
        let user = self.block_on(async move { backend.viewer(ctx).await })?;
        let _ = self.viewer.set(user.clone());
        Ok(user)
    }

    // --- Team-scoped views --------------------------------------------

    pub fn states(&self, ctx: OpCtx, team_id: &str) -> FsResult<Vec<State>> {
        let view = View::TeamStates(team_id.to_string());
        if self.stale(&view) {
            let states = self.block_on(self.backend.team_states(ctx, team_id))?;
            self.cache.replace_team_states(team_id, &states)?;
            self.mark_fresh(view);
        }
        let mut states = self.cache.states_for_team(team_id)?;
        states.sort_by(|a, b| {
            a.state_type.rank().cmp(&b.state_type.rank()).then_with(|| a.name.cmp(&b.name))
        });
        Ok(states)
    }

    pub fn labels(&self, ctx: OpCtx, team_id: &str) -> FsResult<Vec<Label>> {
        let view = View::TeamLabels(team_id.to_string());
        if self.stale(&view) {
            let labels = self.block_on(self.backend.team_labels(ctx, team_id))?;
            self.cache.replace_team_labels(team_id, &labels)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.labels_for_team(team_id)?)
    }

    pub fn issues(&self, ctx: OpCtx, team_id: &str) -> FsResult<Vec<Issue>> {
        if self.stale(&View::TeamIssues(team_id.to_string())) {
            self.block_on(self.refresh_team_issues(ctx, team_id))?;
        }
        Ok(self.cache.issues_for_team(team_id)?)
    }

    /// Lookup by identifier inside a team: fast path straight off the
    /// cache, falling back to a full team-issue fetch.
    pub fn issue_in_team(
        &self,
        ctx: OpCtx,
        team_id: &str,
        identifier: &str,
    ) -> FsResult<Option<Issue>> {
        if let Some(issue) = self.cache.issue_by_identifier(identifier)? {
            return Ok(Some(issue));
        }
        self.block_on(self.refresh_team_issues(ctx, team_id))?;
        Ok(self.cache.issue_by_identifier(identifier)?)
    }

    /// Global identifier lookup used by the resolver and relation triggers.
    pub fn issue_by_identifier(&self, ctx: OpCtx, identifier: &str) -> FsResult<Option<Issue>> {
        if let Some(issue) = self.cache.issue_by_identifier(identifier)? {
            return Ok(Some(issue));
        }
        let backend = self.backend.clone();
        let identifier_owned = identifier.to_string();
        let fetched =
            self.block_on(async move { backend.issue_by_identifier(ctx, &identifier_owned).await })?;
        if let Some(issue) = &fetched {
            self.cache.upsert_issue(issue)?;
        }
        Ok(fetched)
    }

    pub fn issue_by_id(&self, _ctx: OpCtx, issue_id: &str) -> FsResult<Option<Issue>> {
        Ok(self.cache.issue_by_id(issue_id)?)
    }

    pub fn projects(&self, ctx: OpCtx, team_id: &str) -> FsResult<Vec<Project>> {
        let view = View::TeamProjects(team_id.to_string());
        if self.stale(&view) {
            let projects = self.block_on(self.backend.team_projects(ctx, team_id))?;
            self.cache.replace_team_projects(team_id, &projects)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.projects_for_team(team_id)?)
    }

    pub fn project_by_id(&self, _ctx: OpCtx, project_id: &str) -> FsResult<Option<Project>> {
        Ok(self.cache.project_by_id(project_id)?)
    }

    pub fn cycles(&self, ctx: OpCtx, team_id: &str) -> FsResult<Vec<Cycle>> {
        let view = View::TeamCycles(team_id.to_string());
        if self.stale(&view) {
            let cycles = self.block_on(self.backend.team_cycles(ctx, team_id))?;
            self.cache.replace_team_cycles(team_id, &cycles)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.cycles_for_team(team_id)?)
    }

    // --- Issue-scoped views -------------------------------------------

    pub fn comments(&self, ctx: OpCtx, issue_id: &str) -> FsResult<Vec<Comment>> {
        let view = View::IssueComments(issue_id.to_string());
        if self.stale(&view) {
            let comments = self.block_on(self.backend.issue_comments(ctx, issue_id))?;
            self.cache.replace_issue_comments(issue_id, &comments)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.comments_for_issue(issue_id)?)
    }

    pub fn documents(&self, ctx: OpCtx, scope: &DocScope) -> FsResult<Vec<Document>> {
        let view = View::Docs(scope.key());
        if self.stale(&view) {
            let docs = self.block_on(self.backend.documents(ctx, scope))?;
            self.cache.replace_scope_documents(scope, &docs)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.documents_for_scope(scope)?)
    }

    pub fn document_by_id(&self, _ctx: OpCtx, doc_id: &str) -> FsResult<Option<Document>> {
        Ok(self.cache.document_by_id(doc_id)?)
    }

    pub fn milestones(&self, ctx: OpCtx, project_id: &str) -> FsResult<Vec<Milestone>> {
        let view = View::ProjectMilestones(project_id.to_string());
        if self.stale(&view) {
            let milestones = self.block_on(self.backend.project_milestones(ctx, project_id))?;
            self.cache.replace_project_milestones(project_id, &milestones)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.milestones_for_project(project_id)?)
    }

    pub fn updates(&self, ctx: OpCtx, parent: &UpdateParent) -> FsResult<Vec<Update>> {
        let view = View::Updates(parent.key());
        if self.stale(&view) {
            let updates = self.block_on(self.backend.updates(ctx, parent))?;
            self.cache.replace_parent_updates(parent, &updates)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.updates_for_parent(parent)?)
    }

    pub fn initiatives(&self, ctx: OpCtx) -> FsResult<Vec<Initiative>> {
        if self.stale(&View::Initiatives) {
            self.block_on(self.refresh_initiatives(ctx))?;
        }
        Ok(self.cache.initiatives()?)
    }

    pub fn initiative_by_id(&self, ctx: OpCtx, initiative_id: &str) -> FsResult<Option<Initiative>> {
        if let Some(initiative) = self.cache.initiative_by_id(initiative_id)? {
            return Ok(Some(initiative));
        }
        self.block_on(self.refresh_initiatives(ctx))?;
        Ok(self.cache.initiative_by_id(initiative_id)?)
    }

    pub fn initiative_projects(&self, ctx: OpCtx, initiative_id: &str) -> FsResult<Vec<Project>> {
        let view = View::InitiativeProjects(initiative_id.to_string());
        if self.stale(&view) {
            let projects = self.block_on(self.backend.initiative_projects(ctx, initiative_id))?;
            self.cache.replace_initiative_projects(initiative_id, &projects)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.projects_for_initiative(initiative_id)?)
    }

    pub fn attachments(
        &self,
        ctx: OpCtx,
        issue_id: &str,
    ) -> FsResult<(Vec<Attachment>, Vec<EmbeddedFile>)> {
        let view = View::IssueAttachments(issue_id.to_string());
        if self.stale(&view) {
            let (attachments, files) = self.block_on(self.backend.issue_attachments(ctx, issue_id))?;
            self.cache.replace_issue_attachments(issue_id, &attachments, &files)?;
            self.mark_fresh(view);
        }
        Ok((self.cache.attachments_for_issue(issue_id)?, self.cache.files_for_issue(issue_id)?))
    }

    pub fn relations(&self, ctx: OpCtx, issue_id: &str) -> FsResult<Vec<Relation>> {
        let view = View::IssueRelations(issue_id.to_string());
        if self.stale(&view) {
            let relations = self.block_on(self.backend.issue_relations(ctx, issue_id))?;
            self.cache.replace_issue_relations(issue_id, &relations)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.relations_for_issue(issue_id)?)
    }

    pub fn children_of(&self, ctx: OpCtx, parent: &Issue) -> FsResult<Vec<Issue>> {
        if self.stale(&View::TeamIssues(parent.team_id.clone())) {
            self.block_on(self.refresh_team_issues(ctx, &parent.team_id))?;
        }
        Ok(self.cache.children_of(&parent.id)?)
    }

    // --- Per-user views -----------------------------------------------

    pub fn issues_assigned(&self, ctx: OpCtx, user_id: &str) -> FsResult<Vec<Issue>> {
        let view = View::UserIssues(user_id.to_string());
        if self.stale(&view) {
            let issues = self.block_on(self.backend.issues_assigned(ctx, user_id))?;
            self.cache.upsert_issues(&issues)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.issues_assigned(user_id)?)
    }

    pub fn issues_created(&self, ctx: OpCtx, user_id: &str) -> FsResult<Vec<Issue>> {
        let view = View::CreatedIssues(user_id.to_string());
        if self.stale(&view) {
            let issues = self.block_on(self.backend.issues_created(ctx, user_id))?;
            self.cache.upsert_issues(&issues)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.issues_created(user_id)?)
    }

    pub fn issues_for_project(&self, ctx: OpCtx, project_id: &str) -> FsResult<Vec<Issue>> {
        let view = View::ProjectIssues(project_id.to_string());
        if self.stale(&view) {
            let issues = self.block_on(self.backend.project_issues(ctx, project_id))?;
            self.cache.upsert_issues(&issues)?;
            self.mark_fresh(view);
        }
        Ok(self.cache.issues_for_project(project_id)?)
    }

    /// The viewer's issue listing for a `my/` directory.
    pub fn my_issues(&self, ctx: OpCtx, filter: MyFilter) -> FsResult<Vec<Issue>> {
        let viewer = self.viewer(ctx)?;
        match filter {
            MyFilter::Assigned => self.issues_assigned(ctx, &viewer.id),
            MyFilter::Created => self.issues_created(ctx, &viewer.id),
            MyFilter::Active => {
                let assigned = self.issues_assigned(ctx, &viewer.id)?;
                let team_ids: HashSet<String> =
                    assigned.iter().map(|i| i.team_id.clone()).collect();
                let mut started: HashMap<String, StateType> = HashMap::new();
                for team_id in team_ids {
                    for state in self.states(ctx, &team_id)? {
                        started.insert(state.id, state.state_type);
                    }
                }
                Ok(assigned
                    .into_iter()
                    .filter(|issue| {
                        matches!(
                            started.get(&issue.state_id),
                            Some(StateType::Unstarted) | Some(StateType::Started)
                        )
                    })
                    .collect())
            }
        }
    }
}

impl From<crate::api::ApiError> for FsError {
    fn from(e: crate::api::ApiError) -> Self {
        FsError::Io(e.to_string())
    }
}

impl From<crate::db::CacheError> for FsError {
    fn from(e: crate::db::CacheError) -> Self {
        FsError::Io(e.to_string())
    }
}
