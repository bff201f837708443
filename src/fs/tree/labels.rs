//! Per-team `labels/`: writable label files plus the `new.md` trigger.

use super::{ChildEntry, label_file_name};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::dedup_names;
use crate::fs::node::{Node, TriggerKind};

pub(super) fn readdir(eng: &Engine, ctx: OpCtx, team_id: &str) -> FsResult<Vec<ChildEntry>> {
    let labels = eng.repo.labels(ctx, team_id)?;
    let names = dedup_names(labels.iter().map(label_file_name));
    let mut entries: Vec<ChildEntry> = labels
        .into_iter()
        .zip(names)
        .map(|(label, name)| ChildEntry::new(name, Node::LabelFile { label_id: label.id }))
        .collect();
    entries.push(ChildEntry::new(
        "new.md",
        Node::Trigger(TriggerKind::Label { team_id: team_id.to_string(), name: None }),
    ));
    Ok(entries)
}
