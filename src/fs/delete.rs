//! `unlink` and `rmdir`.

use super::prelude::*;

pub fn unlink(fs: &TrailFs, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEmpty) {
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(Errno::ENOENT);
        return;
    };

    // The triggers themselves are permanent fixtures.
    if name == "new.md" || name == "_create" {
        reply.error(Errno::EPERM);
        return;
    }

    let ctx = OpCtx::mutation();
    let target = match tree::lookup(&fs.eng, OpCtx::read(), &parent_node, name) {
        Ok(node) => node,
        Err(e) => {
            reply.error(e.errno());
            return;
        }
    };

    let outcome = match (&parent_node, &target) {
        (Node::CommentsDir { issue_id }, Node::CommentFile { comment_id }) => {
            pipeline::delete_comment(&fs.eng, ctx, issue_id, comment_id, name)
        }
        (Node::DocsDir { scope }, Node::DocFile { doc_id }) => {
            pipeline::delete_document(&fs.eng, ctx, scope, doc_id, name)
        }
        (Node::LabelsDir { team_id }, Node::LabelFile { label_id }) => {
            pipeline::delete_label(&fs.eng, ctx, team_id, label_id, name)
        }
        (Node::AttachmentsDir { issue_id }, Node::LinkFile { attachment_id }) => {
            pipeline::delete_attachment(&fs.eng, ctx, issue_id, attachment_id, name)
        }
        // Embedded binaries belong to the issue body; they cannot be
        // removed from here.
        (Node::AttachmentsDir { .. }, Node::BinFile { .. }) => Err(FsError::NotPermitted),
        (Node::RelationsDir { issue_id }, Node::RelationFile { relation_id }) => {
            pipeline::delete_relation(&fs.eng, ctx, issue_id, relation_id, name)
        }
        _ => Err(FsError::NotPermitted),
    };

    match outcome {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.errno()),
    }
}

pub fn rmdir(fs: &TrailFs, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEmpty) {
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(Errno::ENOENT);
        return;
    };

    match &parent_node {
        // rmdir on an issue archives it, children and all.
        Node::IssuesDir { team_id, key } => {
            let ctx = OpCtx::mutation();
            let issue = match fs.eng.repo.issue_in_team(ctx, team_id, name) {
                Ok(Some(issue)) => issue,
                Ok(None) => {
                    reply.error(Errno::ENOENT);
                    return;
                }
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };
            match pipeline::archive_issue(&fs.eng, ctx, team_id, key, &issue) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.errno()),
            }
        }
        _ => reply.error(Errno::EPERM),
    }
}
