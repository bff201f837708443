//! `create` and `mkdir`.
//!
//! `mkdir` under an issues directory creates a remote issue titled with
//! the directory name. `create` in the comments/docs/labels/milestones
//! directories hands back a creation trigger whose filename seeds the
//! new record's title.

use super::prelude::*;

pub fn create(
    fs: &TrailFs,
    _req: &Request,
    parent: INodeNo,
    name: &OsStr,
    reply: ReplyCreate,
) {
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(Errno::EINVAL);
        return;
    };

    let fallback = |name: &str| {
        let base = name.strip_suffix(".md").unwrap_or(name);
        (!base.is_empty() && base != "new").then(|| base.to_string())
    };

    let trigger = match &parent_node {
        Node::CommentsDir { issue_id } => TriggerKind::Comment { issue_id: issue_id.clone() },
        Node::DocsDir { scope } => {
            TriggerKind::Document { scope: scope.clone(), name: fallback(name) }
        }
        Node::LabelsDir { team_id } => {
            TriggerKind::Label { team_id: team_id.clone(), name: fallback(name) }
        }
        Node::MilestonesDir { project_id } => TriggerKind::Milestone {
            project_id: project_id.clone(),
            name: (name != "_create").then(|| name.to_string()),
        },
        Node::AttachmentsDir { issue_id } if name == "_create" => {
            TriggerKind::Attachment { issue_id: issue_id.clone() }
        }
        Node::RelationsDir { issue_id } if name == "_create" => {
            TriggerKind::Relation { issue_id: issue_id.clone() }
        }
        _ => {
            reply.error(Errno::EPERM);
            return;
        }
    };

    let node = Node::Trigger(trigger);
    fs.register(&node);
    let attr = fs.attr_shell(&node);
    let fh = fs.handles.insert(OpenFile::new(node.clone()));
    reply.created(
        &node.entry_ttl(),
        &attr,
        Generation(0),
        FileHandle(fh),
        FopenFlags::FOPEN_DIRECT_IO,
    );
}

pub fn mkdir(fs: &TrailFs, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEntry) {
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(Errno::EINVAL);
        return;
    };

    match &parent_node {
        Node::IssuesDir { team_id, key } => {
            let ctx = OpCtx::mutation();
            match pipeline::create_issue(&fs.eng, ctx, team_id, key, name) {
                Ok(issue) => {
                    let node = Node::IssueDir { issue_id: issue.id };
                    fs.register(&node);
                    match fs.attr(ctx, &node) {
                        Ok(attr) => reply.entry(&node.entry_ttl(), &attr, Generation(0)),
                        Err(e) => reply.error(e.errno()),
                    }
                }
                Err(e) => reply.error(e.errno()),
            }
        }
        _ => reply.error(Errno::EPERM),
    }
}
