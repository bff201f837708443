//! Issue side-directories: `children/`, `attachments/`, `relations/`.

use super::{ChildEntry, team_key_map};
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};
use crate::fs::Engine;
use crate::fs::name::{dedup_names, issue_link_target, sanitize_component};
use crate::fs::node::{Node, TriggerKind};

/// Components between `teams/<K>/issues/<IDENT>/children/` (or the other
/// issue side-directories) and the root.
const ISSUE_SUBDIR_DEPTH: usize = 5;

pub(super) fn readdir_children(
    eng: &Engine,
    ctx: OpCtx,
    issue_id: &str,
) -> FsResult<Vec<ChildEntry>> {
    let parent = eng.repo.issue_by_id(ctx, issue_id)?.ok_or(FsError::NotFound)?;
    let keys = team_key_map(eng, ctx)?;
    let children = eng.repo.children_of(ctx, &parent)?;
    Ok(children
        .into_iter()
        .filter_map(|child| {
            let key = keys.get(&child.team_id)?;
            let target = issue_link_target(ISSUE_SUBDIR_DEPTH, key, &child.identifier);
            Some(ChildEntry::new(child.identifier, Node::Symlink { target }))
        })
        .collect())
}

pub(super) fn readdir_attachments(
    eng: &Engine,
    ctx: OpCtx,
    issue_id: &str,
) -> FsResult<Vec<ChildEntry>> {
    let (links, files) = eng.repo.attachments(ctx, issue_id)?;

    // One shared namespace: embedded files first, then link files, both
    // run through the same dedup pass so colliding names stay unique.
    let mut raw_names: Vec<String> = Vec::with_capacity(files.len() + links.len());
    let mut nodes: Vec<Node> = Vec::with_capacity(files.len() + links.len());
    for file in &files {
        raw_names.push(sanitize_component(&file.filename));
        nodes.push(Node::BinFile { file_id: file.id.clone() });
    }
    for link in &links {
        raw_names.push(format!("{}.link", sanitize_component(&link.title)));
        nodes.push(Node::LinkFile { attachment_id: link.id.clone() });
    }

    let mut entries: Vec<ChildEntry> = dedup_names(&raw_names)
        .into_iter()
        .zip(nodes)
        .map(|(name, node)| ChildEntry::new(name, node))
        .collect();
    entries.push(ChildEntry::new(
        "_create",
        Node::Trigger(TriggerKind::Attachment { issue_id: issue_id.to_string() }),
    ));
    Ok(entries)
}

pub(super) fn readdir_relations(
    eng: &Engine,
    ctx: OpCtx,
    issue_id: &str,
) -> FsResult<Vec<ChildEntry>> {
    let relations = eng.repo.relations(ctx, issue_id)?;
    let raw_names: Vec<String> = relations
        .iter()
        .map(|relation| {
            let target = eng
                .repo
                .issue_by_id(ctx, &relation.related_issue_id)
                .ok()
                .flatten()
                .map(|i| i.identifier)
                .unwrap_or_else(|| relation.related_issue_id.clone());
            format!("{}-{}.rel", relation.relation_type.as_str(), target)
        })
        .collect();

    let mut entries: Vec<ChildEntry> = dedup_names(&raw_names)
        .into_iter()
        .zip(relations)
        .map(|(name, relation)| {
            ChildEntry::new(name, Node::RelationFile { relation_id: relation.id })
        })
        .collect();
    entries.push(ChildEntry::new(
        "_create",
        Node::Trigger(TriggerKind::Relation { issue_id: issue_id.to_string() }),
    ));
    Ok(entries)
}
