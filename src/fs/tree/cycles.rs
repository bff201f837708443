//! `cycles/`: one directory per cycle plus the `current` symlink.

use chrono::Utc;

use super::ChildEntry;
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::content::cycle_dir_name;
use crate::fs::name::{dedup_names, issue_link_target};
use crate::fs::node::Node;

/// Components between `teams/<K>/cycles/<name>/` and the root.
const CYCLE_DIR_DEPTH: usize = 4;

pub(super) fn readdir_cycles(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    key: &str,
) -> FsResult<Vec<ChildEntry>> {
    let cycles = eng.repo.cycles(ctx, team_id)?;
    let names = dedup_names(cycles.iter().map(cycle_dir_name));

    let mut entries: Vec<ChildEntry> = cycles
        .iter()
        .zip(&names)
        .map(|(cycle, name)| {
            ChildEntry::new(
                name.clone(),
                Node::CycleDir {
                    cycle_id: cycle.id.clone(),
                    team_id: team_id.to_string(),
                    key: key.to_string(),
                },
            )
        })
        .collect();

    // `current` exists iff some cycle is active right now; its target is
    // the sibling directory of that cycle.
    let now = Utc::now();
    if let Some(pos) = cycles.iter().position(|c| c.is_active(now)) {
        entries.push(ChildEntry::new("current", Node::Symlink { target: names[pos].clone() }));
    }
    Ok(entries)
}

pub(super) fn readdir_cycle(
    eng: &Engine,
    ctx: OpCtx,
    cycle_id: &str,
    team_id: &str,
    key: &str,
) -> FsResult<Vec<ChildEntry>> {
    let mut entries = vec![ChildEntry::new(
        "cycle.md",
        Node::CycleInfo { cycle_id: cycle_id.to_string() },
    )];
    let issues = eng.repo.issues(ctx, team_id)?;
    for issue in issues {
        if issue.cycle_id.as_deref() == Some(cycle_id) {
            let target = issue_link_target(CYCLE_DIR_DEPTH, key, &issue.identifier);
            entries.push(ChildEntry::new(issue.identifier, Node::Symlink { target }));
        }
    }
    Ok(entries)
}
