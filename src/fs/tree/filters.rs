//! `by/` filtered views: status, label, and assignee directories whose
//! entries are symlinks into the canonical issue tree.

use super::{ChildEntry, search};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::{issue_link_target, sanitize_component, user_handle};
use crate::fs::node::{FilterKind, IssueScope, Node};

/// Components between a `by/<kind>/<value>/` directory and the root.
const VALUE_DIR_DEPTH: usize = 5;

pub(super) fn readdir_root(team_id: &str, key: &str) -> FsResult<Vec<ChildEntry>> {
    Ok([FilterKind::Status, FilterKind::Label, FilterKind::Assignee]
        .into_iter()
        .map(|kind| {
            ChildEntry::new(
                kind.dir_name(),
                Node::FilterKindDir { team_id: team_id.to_string(), key: key.to_string(), kind },
            )
        })
        .collect())
}

pub(super) fn readdir_kind(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    key: &str,
    kind: FilterKind,
) -> FsResult<Vec<ChildEntry>> {
    let values: Vec<String> = match kind {
        FilterKind::Status => {
            eng.repo.states(ctx, team_id)?.into_iter().map(|s| sanitize_component(&s.name)).collect()
        }
        FilterKind::Label => {
            eng.repo.labels(ctx, team_id)?.into_iter().map(|l| sanitize_component(&l.name)).collect()
        }
        FilterKind::Assignee => {
            // Handles that actually occur on the team's issues, plus the
            // unassigned bucket.
            let issues = eng.repo.issues(ctx, team_id)?;
            let mut handles: Vec<String> = Vec::new();
            for issue in &issues {
                if let Some(assignee_id) = &issue.assignee_id {
                    if let Some(user) = eng.repo.user_by_id(ctx, assignee_id)? {
                        let handle = user_handle(&user);
                        if !handles.contains(&handle) {
                            handles.push(handle);
                        }
                    }
                }
            }
            handles.sort();
            handles.push("unassigned".to_string());
            handles
        }
    };

    Ok(values
        .into_iter()
        .map(|value| {
            ChildEntry::new(
                value.clone(),
                Node::FilterValueDir {
                    team_id: team_id.to_string(),
                    key: key.to_string(),
                    kind,
                    value,
                },
            )
        })
        .collect())
}

pub(super) fn readdir_value(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    key: &str,
    kind: FilterKind,
    value: &str,
) -> FsResult<Vec<ChildEntry>> {
    let scope = IssueScope::Filter {
        team_id: team_id.to_string(),
        key: key.to_string(),
        kind,
        value: value.to_string(),
    };
    let mut entries: Vec<ChildEntry> = search::scope_issues(eng, ctx, &scope)?
        .into_iter()
        .map(|issue| {
            let target = issue_link_target(VALUE_DIR_DEPTH, key, &issue.identifier);
            ChildEntry::new(issue.identifier, Node::Symlink { target })
        })
        .collect();
    entries.push(ChildEntry::new("search", Node::SearchRootDir { scope }));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_dir_depth_matches_tree_shape() {
        // teams/<K>/by/<kind>/<value> = five components below the root.
        assert_eq!(VALUE_DIR_DEPTH, 5);
        assert_eq!(
            issue_link_target(VALUE_DIR_DEPTH, "ENG", "ENG-3"),
            "../../../../../teams/ENG/issues/ENG-3"
        );
    }
}
