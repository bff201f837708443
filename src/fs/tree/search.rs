//! Scoped search: `search/<encoded-query>/` under any issue-listing
//! directory.
//!
//! The `search/` directory itself enumerates nothing; looking up an
//! encoded query (where `+` decodes to a space) materialises a results
//! directory constrained to the enclosing scope's own issue source.

use super::{ChildEntry, team_key_map};
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};
use crate::fs::Engine;
use crate::fs::name::{decode_query, issue_link_target, sanitize_component, user_handle};
use crate::fs::node::{FilterKind, IssueScope, Node};
use crate::model::Issue;

/// The issues visible under a scope, before any query filtering.
pub fn scope_issues(eng: &Engine, ctx: OpCtx, scope: &IssueScope) -> FsResult<Vec<Issue>> {
    match scope {
        IssueScope::Team { team_id, .. } => eng.repo.issues(ctx, team_id),
        IssueScope::My { filter } => eng.repo.my_issues(ctx, *filter),
        IssueScope::Filter { team_id, kind, value, .. } => {
            let issues = eng.repo.issues(ctx, team_id)?;
            match kind {
                FilterKind::Status => {
                    let states = eng.repo.states(ctx, team_id)?;
                    let Some(state) = states
                        .iter()
                        .find(|s| s.name == *value || sanitize_component(&s.name) == *value)
                    else {
                        return Ok(Vec::new());
                    };
                    Ok(issues.into_iter().filter(|i| i.state_id == state.id).collect())
                }
                FilterKind::Label => {
                    let labels = eng.repo.labels(ctx, team_id)?;
                    let Some(label) = labels
                        .iter()
                        .find(|l| l.name == *value || sanitize_component(&l.name) == *value)
                    else {
                        return Ok(Vec::new());
                    };
                    Ok(issues
                        .into_iter()
                        .filter(|i| i.label_ids.contains(&label.id))
                        .collect())
                }
                FilterKind::Assignee => {
                    if value == "unassigned" {
                        return Ok(issues
                            .into_iter()
                            .filter(|i| i.assignee_id.is_none())
                            .collect());
                    }
                    let Some(user) =
                        eng.repo.users(ctx)?.into_iter().find(|u| user_handle(u) == *value)
                    else {
                        return Ok(Vec::new());
                    };
                    Ok(issues
                        .into_iter()
                        .filter(|i| i.assignee_id.as_deref() == Some(user.id.as_str()))
                        .collect())
                }
            }
        }
    }
}

/// Lookup inside `search/`: any non-empty name is an encoded query.
pub(super) fn lookup_results(scope: &IssueScope, encoded: &str) -> FsResult<Node> {
    let query = decode_query(encoded);
    if query.trim().is_empty() {
        return Err(FsError::NotFound);
    }
    Ok(Node::SearchResultsDir { scope: scope.clone(), query })
}

fn matches(issue: &Issue, needle: &str) -> bool {
    issue.identifier.to_lowercase().contains(needle)
        || issue.title.to_lowercase().contains(needle)
        || issue.description.to_lowercase().contains(needle)
}

pub(super) fn readdir_results(
    eng: &Engine,
    ctx: OpCtx,
    scope: &IssueScope,
    query: &str,
) -> FsResult<Vec<ChildEntry>> {
    let needle = query.to_lowercase();
    let depth = scope.results_depth();
    let issues = scope_issues(eng, ctx, scope)?;

    let entries = match scope {
        IssueScope::Team { key, .. } | IssueScope::Filter { key, .. } => issues
            .into_iter()
            .filter(|issue| matches(issue, &needle))
            .map(|issue| {
                let target = issue_link_target(depth, key, &issue.identifier);
                ChildEntry::new(issue.identifier, Node::Symlink { target })
            })
            .collect(),
        IssueScope::My { .. } => {
            let keys = team_key_map(eng, ctx)?;
            issues
                .into_iter()
                .filter(|issue| matches(issue, &needle))
                .filter_map(|issue| {
                    let key = keys.get(&issue.team_id)?;
                    let target = issue_link_target(depth, key, &issue.identifier);
                    Some(ChildEntry::new(issue.identifier, Node::Symlink { target }))
                })
                .collect()
        }
    };
    Ok(entries)
}
