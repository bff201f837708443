//! `issues/` and the per-issue directory.

use super::ChildEntry;
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};
use crate::fs::Engine;
use crate::fs::name::is_identifier;
use crate::fs::node::Node;
use crate::model::DocScope;

pub(super) fn readdir_issues(eng: &Engine, ctx: OpCtx, team_id: &str) -> FsResult<Vec<ChildEntry>> {
    let issues = eng.repo.issues(ctx, team_id)?;
    Ok(issues
        .into_iter()
        .map(|issue| {
            ChildEntry::new(issue.identifier, Node::IssueDir { issue_id: issue.id })
        })
        .collect())
}

/// Lookup fast path: identifier shape check, then the cache, then a full
/// team fetch.
pub(super) fn lookup_issue(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    name: &str,
) -> FsResult<Node> {
    if !is_identifier(name) {
        return Err(FsError::NotFound);
    }
    match eng.repo.issue_in_team(ctx, team_id, name)? {
        Some(issue) => Ok(Node::IssueDir { issue_id: issue.id }),
        None => Err(FsError::NotFound),
    }
}

pub(super) fn readdir_issue(eng: &Engine, ctx: OpCtx, issue_id: &str) -> FsResult<Vec<ChildEntry>> {
    // The static child set; attributes elsewhere come from the issue's
    // own timestamps, so confirm it still exists.
    if eng.repo.issue_by_id(ctx, issue_id)?.is_none() {
        return Err(FsError::NotFound);
    }
    let issue_id = issue_id.to_string();
    Ok(vec![
        ChildEntry::new("issue.md", Node::IssueFile { issue_id: issue_id.clone() }),
        ChildEntry::new("comments", Node::CommentsDir { issue_id: issue_id.clone() }),
        ChildEntry::new("docs", Node::DocsDir { scope: DocScope::Issue(issue_id.clone()) }),
        ChildEntry::new("children", Node::ChildrenDir { issue_id: issue_id.clone() }),
        ChildEntry::new("attachments", Node::AttachmentsDir { issue_id: issue_id.clone() }),
        ChildEntry::new("relations", Node::RelationsDir { issue_id }),
    ])
}
