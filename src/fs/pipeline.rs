//! The write pipeline: buffered text → parse → diff → resolve → mutate
//! → upsert → invalidate.
//!
//! Mutations happen on flush, never on write. A failed flush leaves the
//! dirty buffer intact so the user can correct and retry; resolver
//! failures surface before anything is sent, so no partial update ever
//! reaches the backend. Every path applies the 30 s mutation deadline.

use serde_json::json;
use tracing::info;

use super::Engine;
use super::handles::{OpenFile, Snapshot};
use super::marshal::{MarshalError, issue as issue_doc, records, triggers};
use super::name::title_from_filename;
use super::node::{Node, TriggerKind};
use super::resolve::Resolver;
use crate::api::{IssuePatch, OpCtx};
use crate::error::{FsError, FsResult};
use crate::model::{DocScope, Issue};
use crate::repo::View;

fn invalid(e: MarshalError) -> FsError {
    FsError::invalid(e.to_string())
}

/// Commit an open handle's buffer. Dispatches per node kind; read-only
/// handles flush as a no-op.
pub fn flush(eng: &Engine, file: &mut OpenFile) -> FsResult<()> {
    match &file.node {
        Node::IssueFile { .. } => flush_issue(eng, file),
        Node::DocFile { .. } => flush_document(eng, file),
        Node::LabelFile { .. } => flush_label(eng, file),
        Node::Trigger(_) => flush_trigger(eng, file),
        _ => Ok(()),
    }
}

// --- issue.md --------------------------------------------------------------

fn flush_issue(eng: &Engine, file: &mut OpenFile) -> FsResult<()> {
    if !file.dirty {
        return Ok(());
    }
    let ctx = OpCtx::mutation();

    let text = std::str::from_utf8(&file.buffer).map_err(FsError::io)?;
    // A header that fails to parse is an I/O error on this path: the
    // buffer is preserved and the user re-edits.
    let new_doc = issue_doc::parse(text).map_err(FsError::io)?;

    let Some(Snapshot::Issue(old_doc)) = file.snapshot.clone() else {
        return Err(FsError::Io("issue handle lost its snapshot".to_string()));
    };
    let delta = issue_doc::diff(&old_doc, &new_doc);
    if delta.is_empty() {
        file.dirty = false;
        return Ok(());
    }

    let Node::IssueFile { issue_id } = &file.node else {
        return Err(FsError::Io("not an issue handle".to_string()));
    };
    let issue = eng.repo.issue_by_id(ctx, issue_id)?.ok_or(FsError::NotFound)?;
    let old_assignee = issue.assignee_id.clone();
    let old_project = issue.project_id.clone();

    let patch = build_issue_patch(eng, ctx, &issue, &delta)?;

    let backend = eng.repo.backend().clone();
    let id = issue.id.clone();
    let submitted = patch.clone();
    let updated = eng
        .repo
        .runtime()
        .block_on(async move { backend.update_issue(ctx, &id, &submitted).await })?;

    info!(issue = %issue.identifier, fields = ?delta.field_names(), "issue updated");

    // Subsequent reads reflect the write without a round-trip: the
    // snapshot becomes the submitted document.
    file.snapshot = Some(Snapshot::Issue(new_doc));
    eng.repo.cache().upsert_issue(&updated)?;

    eng.repo.invalidate(&View::TeamIssues(issue.team_id.clone()));
    if delta.assignee.is_some() {
        for user_id in [old_assignee, updated.assignee_id.clone()].into_iter().flatten() {
            eng.repo.invalidate(&View::UserIssues(user_id));
        }
    }
    if delta.project.is_some() {
        for project_id in [old_project, updated.project_id.clone()].into_iter().flatten() {
            eng.repo.invalidate(&View::ProjectIssues(project_id));
        }
    }

    eng.invalidator.inode(file.node.ino());
    eng.invalidator.entry(Node::IssueDir { issue_id: issue.id.clone() }.ino(), "issue.md");

    file.dirty = false;
    Ok(())
}

/// Translate the changed fields into the minimal mutation payload. The
/// payload keys equal the changed-field set exactly.
fn build_issue_patch(
    eng: &Engine,
    ctx: OpCtx,
    issue: &Issue,
    delta: &issue_doc::IssueDelta,
) -> FsResult<IssuePatch> {
    let resolver = Resolver::new(eng, ctx);
    let mut patch = IssuePatch::new();

    if let Some(title) = &delta.title {
        patch.set("title", json!(title));
    }
    if let Some(body) = &delta.body {
        patch.set("description", json!(body));
    }
    if let Some(status) = &delta.status {
        patch.set("status", json!(resolver.state_id(&issue.team_id, status)?));
    }
    if let Some(assignee) = &delta.assignee {
        match assignee {
            Some(token) => patch.set("assignee", json!(resolver.user_id(token)?)),
            None => patch.clear("assignee"),
        }
    }
    if let Some(priority) = delta.priority {
        patch.set("priority", json!(priority));
    }
    if let Some(labels) = &delta.labels {
        if labels.is_empty() {
            // The backend rejects `labels = []`; an emptied sequence is
            // expressed as removal of every current label id.
            patch.set("removed_labels", json!(issue.label_ids.clone()));
        } else {
            patch.set("labels", json!(resolver.label_ids(&issue.team_id, labels)?));
        }
    }
    if let Some(due_date) = &delta.due_date {
        match due_date {
            Some(date) => patch.set("due_date", json!(date.to_string())),
            None => patch.clear("due_date"),
        }
    }
    if let Some(estimate) = &delta.estimate {
        match estimate {
            Some(points) => patch.set("estimate", json!(points)),
            None => patch.clear("estimate"),
        }
    }
    if let Some(parent) = &delta.parent {
        match parent {
            Some(identifier) => patch.set("parent", json!(resolver.parent_issue_id(identifier)?)),
            None => patch.clear("parent"),
        }
    }
    if let Some(project) = &delta.project {
        match project {
            Some(name) => patch.set("project", json!(resolver.project_id(&issue.team_id, name)?)),
            None => patch.clear("project"),
        }
    }
    if let Some(milestone) = &delta.milestone {
        match milestone {
            Some(name) => {
                // Milestones live under the issue's project, including a
                // project assigned in this same write.
                let project_id = match &delta.project {
                    Some(Some(project_name)) => {
                        resolver.project_id(&issue.team_id, project_name)?
                    }
                    _ => issue
                        .project_id
                        .clone()
                        .ok_or_else(|| FsError::invalid(format!("unknown milestone: {name}")))?,
                };
                patch.set("milestone", json!(resolver.milestone_id(&project_id, name)?));
            }
            None => patch.clear("milestone"),
        }
    }
    if let Some(cycle) = &delta.cycle {
        match cycle {
            Some(name) => patch.set("cycle", json!(resolver.cycle_id(&issue.team_id, name)?)),
            None => patch.clear("cycle"),
        }
    }
    Ok(patch)
}

// --- Document and label files ----------------------------------------------

fn flush_document(eng: &Engine, file: &mut OpenFile) -> FsResult<()> {
    if !file.dirty {
        return Ok(());
    }
    let ctx = OpCtx::mutation();
    let text = std::str::from_utf8(&file.buffer).map_err(FsError::io)?;
    let parsed = records::parse_document(text).map_err(FsError::io)?;

    let Some(Snapshot::Document(old)) = file.snapshot.clone() else {
        return Err(FsError::Io("document handle lost its snapshot".to_string()));
    };
    let title = (parsed.title != old.title).then_some(parsed.title.as_str());
    let content = (parsed.body != old.content).then_some(parsed.body.as_str());
    if title.is_none() && content.is_none() {
        file.dirty = false;
        return Ok(());
    }

    let backend = eng.repo.backend().clone();
    let doc_id = old.id.clone();
    let (title_owned, content_owned) = (title.map(String::from), content.map(String::from));
    let mut updated = eng.repo.runtime().block_on(async move {
        backend
            .update_document(ctx, &doc_id, title_owned.as_deref(), content_owned.as_deref())
            .await
    })?;
    // The update response does not carry the scope; keep the known one.
    updated.scope = old.scope.clone();
    if updated.slug.is_none() {
        updated.slug = old.slug.clone();
    }

    info!(doc = %old.id, "document updated");
    eng.repo.cache().upsert_document(&updated)?;
    eng.repo.invalidate(&View::Docs(old.scope.key()));
    eng.invalidator.inode(file.node.ino());
    eng.invalidator.entry(Node::DocsDir { scope: old.scope.clone() }.ino(), "new.md");

    file.snapshot = Some(Snapshot::Document(updated));
    file.dirty = false;
    Ok(())
}

fn flush_label(eng: &Engine, file: &mut OpenFile) -> FsResult<()> {
    if !file.dirty {
        return Ok(());
    }
    let ctx = OpCtx::mutation();
    let text = std::str::from_utf8(&file.buffer).map_err(FsError::io)?;
    let parsed = records::parse_label(text).map_err(FsError::io)?;

    let Some(Snapshot::Label(old)) = file.snapshot.clone() else {
        return Err(FsError::Io("label handle lost its snapshot".to_string()));
    };
    let name = (!parsed.name.is_empty() && parsed.name != old.name).then_some(parsed.name.as_str());
    let color = (parsed.color != old.color).then_some(parsed.color.as_str());
    let description =
        (parsed.description != old.description).then_some(parsed.description.as_str());
    if name.is_none() && color.is_none() && description.is_none() {
        file.dirty = false;
        return Ok(());
    }

    let backend = eng.repo.backend().clone();
    let label_id = old.id.clone();
    let (name_owned, color_owned, description_owned) =
        (name.map(String::from), color.map(String::from), description.map(String::from));
    let mut updated = eng.repo.runtime().block_on(async move {
        backend
            .update_label(
                ctx,
                &label_id,
                name_owned.as_deref(),
                color_owned.as_deref(),
                description_owned.as_deref(),
            )
            .await
    })?;
    if updated.team_id.is_empty() {
        updated.team_id = old.team_id.clone();
    }

    info!(label = %old.name, "label updated");
    eng.repo.cache().upsert_label(&updated)?;
    eng.repo.invalidate(&View::TeamLabels(old.team_id.clone()));
    eng.invalidator.inode(file.node.ino());

    file.snapshot = Some(Snapshot::Label(updated));
    file.dirty = false;
    Ok(())
}

// --- Triggers --------------------------------------------------------------

fn flush_trigger(eng: &Engine, file: &mut OpenFile) -> FsResult<()> {
    if file.created || file.buffer.is_empty() {
        return Ok(());
    }
    let ctx = OpCtx::mutation();
    let text = std::str::from_utf8(&file.buffer).map_err(FsError::io)?.to_string();
    let Node::Trigger(kind) = file.node.clone() else {
        return Err(FsError::Io("not a trigger handle".to_string()));
    };

    let (parent_ino, trigger_name, view) = match &kind {
        TriggerKind::Comment { issue_id } => {
            let body = triggers::parse_new_comment(&text).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let id = issue_id.clone();
            let comment = eng
                .repo
                .runtime()
                .block_on(async move { backend.create_comment(ctx, &id, &body).await })?;
            info!(issue = %issue_id, "comment created");
            eng.repo.cache().upsert_comment(&comment)?;
            (
                Node::CommentsDir { issue_id: issue_id.clone() }.ino(),
                "new.md",
                View::IssueComments(issue_id.clone()),
            )
        }
        TriggerKind::Document { scope, name } => {
            let fallback = name.as_deref().map(title_from_filename);
            let parsed =
                triggers::parse_new_document(&text, fallback.as_deref()).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let scope_owned = scope.clone();
            let document = eng.repo.runtime().block_on(async move {
                backend.create_document(ctx, &scope_owned, &parsed.title, &parsed.content).await
            })?;
            info!(title = %document.title, "document created");
            eng.repo.cache().upsert_document(&document)?;
            (
                Node::DocsDir { scope: scope.clone() }.ino(),
                "new.md",
                View::Docs(scope.key()),
            )
        }
        TriggerKind::Label { team_id, name } => {
            let fallback = name.as_deref().map(title_from_filename);
            let parsed = triggers::parse_new_label(&text, fallback.as_deref()).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let team = team_id.clone();
            let label = eng.repo.runtime().block_on(async move {
                backend
                    .create_label(
                        ctx,
                        &team,
                        &parsed.name,
                        parsed.color.as_deref(),
                        parsed.description.as_deref(),
                    )
                    .await
            })?;
            info!(label = %label.name, "label created");
            eng.repo.cache().upsert_label(&label)?;
            (
                Node::LabelsDir { team_id: team_id.clone() }.ino(),
                "new.md",
                View::TeamLabels(team_id.clone()),
            )
        }
        TriggerKind::Update { parent } => {
            let parsed = triggers::parse_new_update(&text).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let parent_owned = parent.clone();
            let update = eng.repo.runtime().block_on(async move {
                backend.create_update(ctx, &parent_owned, &parsed.body, parsed.health).await
            })?;
            info!(parent = %parent.key(), health = update.health.as_str(), "update created");
            eng.repo.cache().upsert_update(&update)?;
            (
                Node::UpdatesDir { parent: parent.clone() }.ino(),
                "new.md",
                View::Updates(parent.key()),
            )
        }
        TriggerKind::Milestone { project_id, name } => {
            let fallback = name.as_deref().map(title_from_filename);
            let parsed =
                triggers::parse_new_milestone(&text, fallback.as_deref()).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let project = project_id.clone();
            let milestone = eng.repo.runtime().block_on(async move {
                backend
                    .create_milestone(
                        ctx,
                        &project,
                        &parsed.name,
                        &parsed.description,
                        parsed.target_date,
                    )
                    .await
            })?;
            info!(milestone = %milestone.name, "milestone created");
            eng.repo.cache().upsert_milestone(&milestone)?;
            (
                Node::MilestonesDir { project_id: project_id.clone() }.ino(),
                "_create",
                View::ProjectMilestones(project_id.clone()),
            )
        }
        TriggerKind::Attachment { issue_id } => {
            let parsed = triggers::parse_attachment_line(&text).map_err(invalid)?;
            let backend = eng.repo.backend().clone();
            let id = issue_id.clone();
            let attachment = eng.repo.runtime().block_on(async move {
                backend.create_attachment(ctx, &id, &parsed.url, parsed.title.as_deref()).await
            })?;
            info!(issue = %issue_id, url = %attachment.url, "attachment created");
            eng.repo.cache().upsert_attachment(&attachment)?;
            (
                Node::AttachmentsDir { issue_id: issue_id.clone() }.ino(),
                "_create",
                View::IssueAttachments(issue_id.clone()),
            )
        }
        TriggerKind::Relation { issue_id } => {
            let parsed = triggers::parse_relation_line(&text).map_err(invalid)?;
            // Unknown target is "no such entity", distinct from a
            // malformed line.
            let target = eng
                .repo
                .issue_by_identifier(ctx, &parsed.target_identifier)?
                .ok_or(FsError::NotFound)?;
            let backend = eng.repo.backend().clone();
            let id = issue_id.clone();
            let relation = eng.repo.runtime().block_on(async move {
                backend.create_relation(ctx, &id, &target.id, parsed.relation_type).await
            })?;
            info!(issue = %issue_id, kind = relation.relation_type.as_str(), "relation created");
            eng.repo.cache().upsert_relation(&relation)?;
            (
                Node::RelationsDir { issue_id: issue_id.clone() }.ino(),
                "_create",
                View::IssueRelations(issue_id.clone()),
            )
        }
    };

    eng.repo.invalidate(&view);
    // The parent directory changed, and the trigger entry could now mask
    // a real record with the same name.
    eng.invalidator.inode(parent_ino);
    eng.invalidator.entry(parent_ino, trigger_name);

    file.created = true;
    file.dirty = false;
    Ok(())
}

// --- Directory-level mutations ---------------------------------------------

/// `mkdir teams/<K>/issues/<title>`: create the issue remotely and
/// return the fully populated record.
pub fn create_issue(eng: &Engine, ctx: OpCtx, team_id: &str, key: &str, title: &str) -> FsResult<Issue> {
    let backend = eng.repo.backend().clone();
    let team = team_id.to_string();
    let title_owned = title.to_string();
    let issue = eng
        .repo
        .runtime()
        .block_on(async move { backend.create_issue(ctx, &team, &title_owned).await })?;
    info!(issue = %issue.identifier, "issue created");

    eng.repo.cache().upsert_issue(&issue)?;
    eng.repo.invalidate(&View::TeamIssues(team_id.to_string()));
    if let Ok(viewer) = eng.repo.viewer(ctx) {
        eng.repo.invalidate(&View::UserIssues(viewer.id.clone()));
        eng.repo.invalidate(&View::CreatedIssues(viewer.id));
    }

    let parent = Node::IssuesDir { team_id: team_id.to_string(), key: key.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), &issue.identifier);
    Ok(issue)
}

/// `rmdir teams/<K>/issues/<IDENT>`: archive remotely, drop locally.
pub fn archive_issue(eng: &Engine, ctx: OpCtx, team_id: &str, key: &str, issue: &Issue) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = issue.id.clone();
    eng.repo.runtime().block_on(async move { backend.archive_issue(ctx, &id).await })?;
    info!(issue = %issue.identifier, "issue archived");

    eng.repo.cache().delete_issue(&issue.id)?;
    eng.repo.invalidate(&View::TeamIssues(team_id.to_string()));
    if let Some(assignee) = &issue.assignee_id {
        eng.repo.invalidate(&View::UserIssues(assignee.clone()));
    }

    let parent = Node::IssuesDir { team_id: team_id.to_string(), key: key.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), &issue.identifier);
    Ok(())
}

/// Success is reported only when the remote delete succeeds; a comment
/// already gone remotely surfaces the backend failure as I/O error.
pub fn delete_comment(eng: &Engine, ctx: OpCtx, issue_id: &str, comment_id: &str, name: &str) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = comment_id.to_string();
    eng.repo.runtime().block_on(async move { backend.delete_comment(ctx, &id).await })?;
    eng.repo.cache().delete_comment(comment_id)?;
    eng.repo.invalidate(&View::IssueComments(issue_id.to_string()));

    let parent = Node::CommentsDir { issue_id: issue_id.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), name);
    Ok(())
}

pub fn delete_document(eng: &Engine, ctx: OpCtx, scope: &DocScope, doc_id: &str, name: &str) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = doc_id.to_string();
    eng.repo.runtime().block_on(async move { backend.delete_document(ctx, &id).await })?;
    eng.repo.cache().delete_document(doc_id)?;
    eng.repo.invalidate(&View::Docs(scope.key()));

    let parent = Node::DocsDir { scope: scope.clone() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), name);
    Ok(())
}

pub fn delete_label(eng: &Engine, ctx: OpCtx, team_id: &str, label_id: &str, name: &str) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = label_id.to_string();
    eng.repo.runtime().block_on(async move { backend.delete_label(ctx, &id).await })?;
    eng.repo.cache().delete_label(label_id)?;
    eng.repo.invalidate(&View::TeamLabels(team_id.to_string()));
    eng.repo.invalidate(&View::TeamIssues(team_id.to_string()));

    let parent = Node::LabelsDir { team_id: team_id.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), name);
    Ok(())
}

pub fn delete_attachment(eng: &Engine, ctx: OpCtx, issue_id: &str, attachment_id: &str, name: &str) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = attachment_id.to_string();
    eng.repo.runtime().block_on(async move { backend.delete_attachment(ctx, &id).await })?;
    eng.repo.cache().delete_attachment(attachment_id)?;
    eng.repo.invalidate(&View::IssueAttachments(issue_id.to_string()));

    let parent = Node::AttachmentsDir { issue_id: issue_id.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), name);
    Ok(())
}

pub fn delete_relation(eng: &Engine, ctx: OpCtx, issue_id: &str, relation_id: &str, name: &str) -> FsResult<()> {
    let backend = eng.repo.backend().clone();
    let id = relation_id.to_string();
    eng.repo.runtime().block_on(async move { backend.delete_relation(ctx, &id).await })?;
    eng.repo.cache().delete_relation(relation_id)?;
    eng.repo.invalidate(&View::IssueRelations(issue_id.to_string()));

    let parent = Node::RelationsDir { issue_id: issue_id.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), name);
    Ok(())
}

/// Same-directory document rename: the new filename is the new title.
pub fn rename_document(
    eng: &Engine,
    ctx: OpCtx,
    scope: &DocScope,
    doc_id: &str,
    old_name: &str,
    new_name: &str,
) -> FsResult<()> {
    let title = title_from_filename(new_name);
    let backend = eng.repo.backend().clone();
    let id = doc_id.to_string();
    let title_owned = title.clone();
    let mut updated = eng.repo.runtime().block_on(async move {
        backend.update_document(ctx, &id, Some(&title_owned), None).await
    })?;
    updated.scope = scope.clone();
    // A rename changes the visible name, so the stale slug must not keep
    // winning the filename derivation.
    updated.slug = None;
    info!(doc = %doc_id, title = %title, "document renamed");

    eng.repo.cache().upsert_document(&updated)?;
    eng.repo.invalidate(&View::Docs(scope.key()));

    let parent = Node::DocsDir { scope: scope.clone() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), old_name);
    eng.invalidator.entry(parent.ino(), new_name);
    Ok(())
}

/// Same-directory label rename.
pub fn rename_label(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    label_id: &str,
    old_name: &str,
    new_name: &str,
) -> FsResult<()> {
    let name = title_from_filename(new_name);
    let backend = eng.repo.backend().clone();
    let id = label_id.to_string();
    let name_owned = name.clone();
    let mut updated = eng.repo.runtime().block_on(async move {
        backend.update_label(ctx, &id, Some(&name_owned), None, None).await
    })?;
    if updated.team_id.is_empty() {
        updated.team_id = team_id.to_string();
    }
    info!(label = %label_id, name = %name, "label renamed");

    eng.repo.cache().upsert_label(&updated)?;
    eng.repo.invalidate(&View::TeamLabels(team_id.to_string()));

    let parent = Node::LabelsDir { team_id: team_id.to_string() };
    eng.invalidator.inode(parent.ino());
    eng.invalidator.entry(parent.ino(), old_name);
    eng.invalidator.entry(parent.ino(), new_name);
    Ok(())
}
