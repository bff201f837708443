//! Synthesized file content.
//!
//! Every regular-file node's bytes are produced here, on demand, from
//! repository reads. `getattr` uses the same functions so `ls -l` sizes
//! always match a subsequent read.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use super::Engine;
use super::marshal::{issue as issue_doc, records};
use super::name;
use super::node::Node;
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};
use crate::model::{Cycle, Issue, User};

pub const README: &str = "\
# Tracker mount

This mount projects your issue tracker as files.

    teams/<KEY>/issues/<IDENT>/issue.md   read and edit issues
    teams/<KEY>/by/...                    filtered views (symlinks)
    teams/<KEY>/search/<query>/           scoped search; `+` means space
    my/assigned  my/created  my/active    your issues
    users/<handle>/                       per-user views

Create records through the filesystem:

    mkdir teams/ENG/issues/\"Fix the thing\"      new issue
    echo LGTM > .../comments/new.md             new comment
    echo url title > .../attachments/_create    new attachment link
    echo \"blocks ENG-7\" > .../relations/_create  new relation

Edits to `issue.md` headers are pushed to the tracker on save. Status,
assignee, labels, project, milestone, and cycle take names, not ids.
";

/// The display handle of a user record.
pub fn user_display(user: &User) -> String {
    if user.display_name.is_empty() { user.name.clone() } else { user.display_name.clone() }
}

/// Directory name of a cycle: its name when set, else its number.
pub fn cycle_dir_name(cycle: &Cycle) -> String {
    match &cycle.name {
        Some(name) if !name.is_empty() => name::name_style(name),
        _ => cycle.number.to_string(),
    }
}

fn to_system_time(dt: DateTime<Utc>) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_secs(dt.timestamp().max(0) as u64)
}

/// Build the display snapshot of an issue, flattening related records
/// into their human names.
pub fn issue_snapshot(eng: &Engine, ctx: OpCtx, issue: &Issue) -> FsResult<issue_doc::IssueDoc> {
    let states = eng.repo.states(ctx, &issue.team_id)?;
    let status = states
        .iter()
        .find(|s| s.id == issue.state_id)
        .map(|s| s.name.clone())
        .unwrap_or_default();

    let assignee = match &issue.assignee_id {
        Some(user_id) => eng.repo.user_by_id(ctx, user_id)?.map(|u| user_display(&u)),
        None => None,
    };

    let labels = if issue.label_ids.is_empty() {
        Vec::new()
    } else {
        eng.repo
            .labels(ctx, &issue.team_id)?
            .into_iter()
            .filter(|l| issue.label_ids.contains(&l.id))
            .map(|l| l.name)
            .collect()
    };

    let project = match &issue.project_id {
        Some(project_id) => eng.repo.project_by_id(ctx, project_id)?.map(|p| p.name),
        None => None,
    };

    let milestone = match (&issue.milestone_id, &issue.project_id) {
        (Some(milestone_id), Some(project_id)) => eng
            .repo
            .milestones(ctx, project_id)?
            .into_iter()
            .find(|m| &m.id == milestone_id)
            .map(|m| m.name),
        _ => None,
    };

    let cycle = match &issue.cycle_id {
        Some(cycle_id) => eng
            .repo
            .cycles(ctx, &issue.team_id)?
            .into_iter()
            .find(|c| &c.id == cycle_id)
            .map(|c| match &c.name {
                Some(name) if !name.is_empty() => name.clone(),
                _ => c.number.to_string(),
            }),
        None => None,
    };

    let parent = match &issue.parent_id {
        Some(parent_id) => eng.repo.issue_by_id(ctx, parent_id)?.map(|p| p.identifier),
        None => None,
    };

    let names = issue_doc::RelatedNames { status, assignee, labels, parent, project, milestone, cycle };
    Ok(issue_doc::doc_from_issue(issue, &names))
}

/// Bytes of any regular-file node except embedded binaries (those go
/// through the blob cache so placeholder sizing stays possible).
pub fn read_node(eng: &Engine, ctx: OpCtx, node: &Node) -> FsResult<Vec<u8>> {
    let text = match node {
        Node::Readme => README.to_string(),
        Node::TeamInfo { team_id } => {
            let team = eng.repo.team_by_id(ctx, team_id)?.ok_or(FsError::NotFound)?;
            records::team_text(&team)
        }
        Node::StatesFile { team_id } => {
            let states = eng.repo.states(ctx, team_id)?;
            let mut out = String::new();
            for state in states {
                out.push_str(&format!("{} ({})\n", state.name, state.state_type.as_str()));
            }
            out
        }
        Node::LabelsInfo { team_id } => {
            let labels = eng.repo.labels(ctx, team_id)?;
            let mut out = String::new();
            for label in labels {
                if label.description.is_empty() {
                    out.push_str(&format!("{}  {}\n", label.name, label.color));
                } else {
                    out.push_str(&format!(
                        "{}  {}  {}\n",
                        label.name, label.color, label.description
                    ));
                }
            }
            out
        }
        Node::IssueFile { issue_id } => {
            let issue = eng.repo.issue_by_id(ctx, issue_id)?.ok_or(FsError::NotFound)?;
            issue_doc::format(&issue_snapshot(eng, ctx, &issue)?)
        }
        Node::CommentFile { comment_id } => {
            let comment = eng
                .repo
                .cache()
                .comment_by_id(comment_id)?
                .ok_or(FsError::NotFound)?;
            let author = match &comment.author_id {
                Some(author_id) => eng.repo.user_by_id(ctx, author_id)?,
                None => None,
            };
            records::comment_text(&comment, author.as_ref())
        }
        Node::DocFile { doc_id } => {
            let doc = eng.repo.document_by_id(ctx, doc_id)?.ok_or(FsError::NotFound)?;
            records::document_text(&doc)
        }
        Node::LabelFile { label_id } => {
            let label = eng
                .repo
                .cache()
                .label_by_id(label_id)?
                .ok_or(FsError::NotFound)?;
            records::label_text(&label)
        }
        Node::ProjectInfo { project_id } => {
            let project = eng.repo.project_by_id(ctx, project_id)?.ok_or(FsError::NotFound)?;
            let lead = match &project.lead_id {
                Some(lead_id) => eng.repo.user_by_id(ctx, lead_id)?,
                None => None,
            };
            records::project_text(&project, lead.as_ref())
        }
        Node::CycleInfo { cycle_id } => {
            let cycle =
                eng.repo.cache().cycle_by_id(cycle_id)?.ok_or(FsError::NotFound)?;
            records::cycle_text(&cycle)
        }
        Node::MilestoneFile { milestone_id } => {
            let milestone =
                eng.repo.cache().milestone_by_id(milestone_id)?.ok_or(FsError::NotFound)?;
            records::milestone_text(&milestone)
        }
        Node::InitiativeInfo { initiative_id } => {
            let initiative =
                eng.repo.initiative_by_id(ctx, initiative_id)?.ok_or(FsError::NotFound)?;
            let owner = match &initiative.owner_id {
                Some(owner_id) => eng.repo.user_by_id(ctx, owner_id)?,
                None => None,
            };
            records::initiative_text(&initiative, owner.as_ref())
        }
        Node::UpdateFile { update_id } => {
            let update =
                eng.repo.cache().update_by_id(update_id)?.ok_or(FsError::NotFound)?;
            let author = match &update.author_id {
                Some(author_id) => eng.repo.user_by_id(ctx, author_id)?,
                None => None,
            };
            records::update_text(&update, author.as_ref())
        }
        Node::UserInfo { user_id } => {
            let user = eng.repo.user_by_id(ctx, user_id)?.ok_or(FsError::NotFound)?;
            records::user_text(&user)
        }
        Node::LinkFile { attachment_id } => {
            let attachment =
                eng.repo.cache().attachment_by_id(attachment_id)?.ok_or(FsError::NotFound)?;
            records::attachment_link_text(&attachment)
        }
        Node::RelationFile { relation_id } => {
            let relation =
                eng.repo.cache().relation_by_id(relation_id)?.ok_or(FsError::NotFound)?;
            let source = eng
                .repo
                .issue_by_id(ctx, &relation.issue_id)?
                .map(|i| i.identifier)
                .unwrap_or_else(|| relation.issue_id.clone());
            let target = eng
                .repo
                .issue_by_id(ctx, &relation.related_issue_id)?
                .map(|i| i.identifier)
                .unwrap_or_else(|| relation.related_issue_id.clone());
            records::relation_text(&relation, &source, &target)
        }
        Node::BinFile { .. } => return Err(FsError::NotFound),
        Node::Trigger(_) => return Err(FsError::Denied),
        _ => return Err(FsError::IsDirectory),
    };
    Ok(text.into_bytes())
}

/// Modification/creation times surfaced in attributes; synthetic nodes
/// without a backing record report the epoch.
pub fn node_times(eng: &Engine, ctx: OpCtx, node: &Node) -> (SystemTime, SystemTime) {
    let looked_up: Option<(DateTime<Utc>, DateTime<Utc>)> = match node {
        Node::IssueDir { issue_id } | Node::IssueFile { issue_id } => eng
            .repo
            .issue_by_id(ctx, issue_id)
            .ok()
            .flatten()
            .map(|i| (i.updated_at, i.created_at)),
        Node::CommentFile { comment_id } => eng
            .repo
            .cache()
            .comment_by_id(comment_id)
            .ok()
            .flatten()
            .map(|c| (c.updated_at, c.created_at)),
        Node::DocFile { doc_id } => eng
            .repo
            .document_by_id(ctx, doc_id)
            .ok()
            .flatten()
            .map(|d| (d.updated_at, d.created_at)),
        Node::LabelFile { label_id } => eng
            .repo
            .cache()
            .label_by_id(label_id)
            .ok()
            .flatten()
            .map(|l| (l.updated_at, l.created_at)),
        Node::ProjectDir { project_id, .. } | Node::ProjectInfo { project_id } => eng
            .repo
            .project_by_id(ctx, project_id)
            .ok()
            .flatten()
            .map(|p| (p.updated_at, p.created_at)),
        Node::CycleDir { cycle_id, .. } | Node::CycleInfo { cycle_id } => eng
            .repo
            .cache()
            .cycle_by_id(cycle_id)
            .ok()
            .flatten()
            .map(|c| (c.updated_at, c.created_at)),
        Node::MilestoneFile { milestone_id } => eng
            .repo
            .cache()
            .milestone_by_id(milestone_id)
            .ok()
            .flatten()
            .map(|m| (m.updated_at, m.created_at)),
        Node::UpdateFile { update_id } => eng
            .repo
            .cache()
            .update_by_id(update_id)
            .ok()
            .flatten()
            .map(|u| (u.updated_at, u.created_at)),
        Node::LinkFile { attachment_id } => eng
            .repo
            .cache()
            .attachment_by_id(attachment_id)
            .ok()
            .flatten()
            .map(|a| (a.updated_at, a.created_at)),
        Node::BinFile { file_id } => eng
            .repo
            .cache()
            .file_by_id(file_id)
            .ok()
            .flatten()
            .map(|f| (f.updated_at, f.created_at)),
        _ => None,
    };
    match looked_up {
        Some((mtime, crtime)) => (to_system_time(mtime), to_system_time(crtime)),
        None => (UNIX_EPOCH, UNIX_EPOCH),
    }
}
