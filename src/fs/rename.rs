//! `rename`: same-directory only, for documents and labels.
//!
//! The new filename carries the new title (`.md` stripped, dashes back
//! to spaces). Any rename across two directories is a cross-device
//! link, uniformly.

use super::prelude::*;

#[allow(clippy::too_many_arguments)]
pub fn rename(
    fs: &TrailFs,
    _req: &Request,
    parent: INodeNo,
    name: &OsStr,
    newparent: INodeNo,
    newname: &OsStr,
    reply: ReplyEmpty,
) {
    if parent != newparent {
        reply.error(Errno::EXDEV);
        return;
    }
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let (Some(name), Some(newname)) = (name.to_str(), newname.to_str()) else {
        reply.error(Errno::EINVAL);
        return;
    };
    if name == "new.md" || name == "_create" {
        reply.error(Errno::EPERM);
        return;
    }

    let target = match tree::lookup(&fs.eng, OpCtx::read(), &parent_node, name) {
        Ok(node) => node,
        Err(e) => {
            reply.error(e.errno());
            return;
        }
    };

    let ctx = OpCtx::mutation();
    let outcome = match (&parent_node, &target) {
        (Node::DocsDir { scope }, Node::DocFile { doc_id }) => {
            pipeline::rename_document(&fs.eng, ctx, scope, doc_id, name, newname)
        }
        (Node::LabelsDir { team_id }, Node::LabelFile { label_id }) => {
            pipeline::rename_label(&fs.eng, ctx, team_id, label_id, name, newname)
        }
        _ => Err(FsError::NotPermitted),
    };

    match outcome {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.errno()),
    }
}
