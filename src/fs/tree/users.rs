//! `users/` and the viewer's `my/` subtree.

use super::{ChildEntry, team_key_map};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::{dedup_names, issue_link_target, user_handle};
use crate::fs::node::{IssueScope, Node};
use crate::repo::MyFilter;

/// Components between `users/<handle>/` or `my/<filter>/` and the root.
const USER_DIR_DEPTH: usize = 2;

pub(super) fn readdir_users(eng: &Engine, ctx: OpCtx) -> FsResult<Vec<ChildEntry>> {
    let users = eng.repo.users(ctx)?;
    let handles = dedup_names(users.iter().map(user_handle));
    Ok(users
        .into_iter()
        .zip(handles)
        .map(|(user, handle)| {
            ChildEntry::new(
                handle.clone(),
                Node::UserDir { user_id: user.id, handle },
            )
        })
        .collect())
}

pub(super) fn readdir_user(eng: &Engine, ctx: OpCtx, user_id: &str) -> FsResult<Vec<ChildEntry>> {
    let mut entries =
        vec![ChildEntry::new(".user.md", Node::UserInfo { user_id: user_id.to_string() })];
    let keys = team_key_map(eng, ctx)?;
    for issue in eng.repo.issues_assigned(ctx, user_id)? {
        if let Some(key) = keys.get(&issue.team_id) {
            let target = issue_link_target(USER_DIR_DEPTH, key, &issue.identifier);
            entries.push(ChildEntry::new(issue.identifier, Node::Symlink { target }));
        }
    }
    Ok(entries)
}

pub(super) fn readdir_my() -> FsResult<Vec<ChildEntry>> {
    Ok([MyFilter::Assigned, MyFilter::Created, MyFilter::Active]
        .into_iter()
        .map(|filter| ChildEntry::new(filter.dir_name(), Node::MyIssuesDir { filter }))
        .collect())
}

pub(super) fn readdir_my_issues(
    eng: &Engine,
    ctx: OpCtx,
    filter: MyFilter,
) -> FsResult<Vec<ChildEntry>> {
    let keys = team_key_map(eng, ctx)?;
    let mut entries: Vec<ChildEntry> = Vec::new();
    for issue in eng.repo.my_issues(ctx, filter)? {
        if let Some(key) = keys.get(&issue.team_id) {
            let target = issue_link_target(USER_DIR_DEPTH, key, &issue.identifier);
            entries.push(ChildEntry::new(issue.identifier, Node::Symlink { target }));
        }
    }
    entries.push(ChildEntry::new(
        "search",
        Node::SearchRootDir { scope: IssueScope::My { filter } },
    ));
    Ok(entries)
}
