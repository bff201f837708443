//! `docs/`: documents named by slug plus the `new.md` trigger.

use super::{ChildEntry, doc_file_name};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::dedup_names;
use crate::fs::node::{Node, TriggerKind};
use crate::model::DocScope;

pub(super) fn readdir(eng: &Engine, ctx: OpCtx, scope: &DocScope) -> FsResult<Vec<ChildEntry>> {
    let docs = eng.repo.documents(ctx, scope)?;
    let names = dedup_names(docs.iter().map(doc_file_name));
    let mut entries: Vec<ChildEntry> = docs
        .into_iter()
        .zip(names)
        .map(|(doc, name)| ChildEntry::new(name, Node::DocFile { doc_id: doc.id }))
        .collect();
    entries.push(ChildEntry::new(
        "new.md",
        Node::Trigger(TriggerKind::Document { scope: scope.clone(), name: None }),
    ));
    Ok(entries)
}
