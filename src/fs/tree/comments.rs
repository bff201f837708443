//! `comments/`: timestamped read-only files plus the `new.md` trigger.

use super::{ChildEntry, comment_file_name};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::node::{Node, TriggerKind};

pub(super) fn readdir(eng: &Engine, ctx: OpCtx, issue_id: &str) -> FsResult<Vec<ChildEntry>> {
    let comments = eng.repo.comments(ctx, issue_id)?;
    let mut entries: Vec<ChildEntry> = comments
        .iter()
        .enumerate()
        .map(|(i, comment)| {
            ChildEntry::new(
                comment_file_name(i + 1, comment),
                Node::CommentFile { comment_id: comment.id.clone() },
            )
        })
        .collect();
    entries.push(ChildEntry::new(
        "new.md",
        Node::Trigger(TriggerKind::Comment { issue_id: issue_id.to_string() }),
    ));
    Ok(entries)
}
