//! Child rules of every directory kind: listing and name resolution.
//!
//! Directories hold no materialised children; `readdir` and `lookup`
//! query the repository and build fresh [`Node`] descriptors each time.
//! Listing and lookup share the same name derivation (including
//! deduplication), so any name a listing produced resolves back to the
//! same record.

mod attachments;
mod comments;
mod cycles;
mod docs;
mod filters;
mod initiatives;
mod issues;
mod labels;
mod projects;
mod root;
mod search;
mod teams;
mod users;

use std::collections::HashMap;

pub use search::scope_issues;

use super::Engine;
use super::node::Node;
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};
use crate::model::{Comment, Document, Label, Update};

/// One directory entry: the name and the child's descriptor.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub node: Node,
}

impl ChildEntry {
    pub fn new(name: impl Into<String>, node: Node) -> Self {
        Self { name: name.into(), node }
    }
}

/// List a directory's children.
pub fn readdir(eng: &Engine, ctx: OpCtx, node: &Node) -> FsResult<Vec<ChildEntry>> {
    match node {
        Node::Root => root::readdir(eng),
        Node::TeamsDir => teams::readdir_teams(eng, ctx),
        Node::TeamDir { team_id, key } => teams::readdir_team(team_id, key),
        Node::FilterRoot { team_id, key } => filters::readdir_root(team_id, key),
        Node::FilterKindDir { team_id, key, kind } => {
            filters::readdir_kind(eng, ctx, team_id, key, *kind)
        }
        Node::FilterValueDir { team_id, key, kind, value } => {
            filters::readdir_value(eng, ctx, team_id, key, *kind, value)
        }
        Node::CyclesDir { team_id, key } => cycles::readdir_cycles(eng, ctx, team_id, key),
        Node::CycleDir { cycle_id, team_id, key } => {
            cycles::readdir_cycle(eng, ctx, cycle_id, team_id, key)
        }
        Node::ProjectsDir { team_id, key } => projects::readdir_projects(eng, ctx, team_id, key),
        Node::ProjectDir { project_id, team_id, key } => {
            projects::readdir_project(project_id, team_id, key)
        }
        Node::MilestonesDir { project_id } => projects::readdir_milestones(eng, ctx, project_id),
        Node::UpdatesDir { parent } => projects::readdir_updates(eng, ctx, parent),
        Node::IssuesDir { team_id, .. } => issues::readdir_issues(eng, ctx, team_id),
        Node::IssueDir { issue_id } => issues::readdir_issue(eng, ctx, issue_id),
        Node::CommentsDir { issue_id } => comments::readdir(eng, ctx, issue_id),
        Node::DocsDir { scope } => docs::readdir(eng, ctx, scope),
        Node::ChildrenDir { issue_id } => attachments::readdir_children(eng, ctx, issue_id),
        Node::AttachmentsDir { issue_id } => attachments::readdir_attachments(eng, ctx, issue_id),
        Node::RelationsDir { issue_id } => attachments::readdir_relations(eng, ctx, issue_id),
        Node::LabelsDir { team_id } => labels::readdir(eng, ctx, team_id),
        Node::UsersDir => users::readdir_users(eng, ctx),
        Node::UserDir { user_id, .. } => users::readdir_user(eng, ctx, user_id),
        Node::MyDir => users::readdir_my(),
        Node::MyIssuesDir { filter } => users::readdir_my_issues(eng, ctx, *filter),
        Node::InitiativesDir => initiatives::readdir_initiatives(eng, ctx),
        Node::InitiativeDir { initiative_id, slug } => {
            initiatives::readdir_initiative(initiative_id, slug)
        }
        Node::InitiativeProjectsDir { initiative_id } => {
            initiatives::readdir_initiative_projects(eng, ctx, initiative_id)
        }
        Node::SearchRootDir { .. } => Ok(Vec::new()),
        Node::SearchResultsDir { scope, query } => search::readdir_results(eng, ctx, scope, query),
        node if node.is_dir() => Ok(Vec::new()),
        _ => Err(FsError::NotDirectory),
    }
}

/// Resolve one child by name.
pub fn lookup(eng: &Engine, ctx: OpCtx, parent: &Node, name: &str) -> FsResult<Node> {
    match parent {
        Node::SearchRootDir { scope } => return search::lookup_results(scope, name),
        // Result directories only ever hold issue symlinks; reject
        // nonsense names before touching the issue source.
        Node::SearchResultsDir { .. } if !super::name::is_identifier(name) => {
            return Err(FsError::NotFound);
        }
        Node::IssuesDir { team_id, .. } => return issues::lookup_issue(eng, ctx, team_id, name),
        Node::CommentsDir { issue_id } if name == "new.md" => {
            return Ok(Node::Trigger(super::node::TriggerKind::Comment {
                issue_id: issue_id.clone(),
            }));
        }
        _ => {}
    }
    // Default path: the child rules are the listing rules.
    readdir(eng, ctx, parent)?
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.node)
        .ok_or(FsError::NotFound)
}

/// `teams.id -> teams.key` map for symlink target construction.
pub(super) fn team_key_map(eng: &Engine, ctx: OpCtx) -> FsResult<HashMap<String, String>> {
    Ok(eng.repo.teams(ctx)?.into_iter().map(|t| (t.id, t.key)).collect())
}

/// Comment file name: `<seq>-<YYYY-MM-DDThh-mm>.md`, sequence in
/// creation order.
pub(super) fn comment_file_name(seq: usize, comment: &Comment) -> String {
    format!("{seq}-{}.md", comment.created_at.format("%Y-%m-%dT%H-%M"))
}

/// Update file name: `<seq>-<YYYY-MM-DD>.md`.
pub(super) fn update_file_name(seq: usize, update: &Update) -> String {
    format!("{seq}-{}.md", update.created_at.format("%Y-%m-%d"))
}

/// Document file name: slug when present, slugified title otherwise.
pub(super) fn doc_file_name(doc: &Document) -> String {
    format!("{}.md", super::name::slug_or(&doc.title, doc.slug.as_deref(), &doc.id))
}

/// Label file name: name with spaces and slashes dashed.
pub(super) fn label_file_name(label: &Label) -> String {
    format!("{}.md", super::name::name_style(&label.name))
}
