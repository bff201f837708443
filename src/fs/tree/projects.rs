//! `projects/`, per-project directories, milestones, and update streams.

use super::{ChildEntry, update_file_name};
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::{dedup_names, name_style, slug_or};
use crate::fs::node::{Node, TriggerKind};
use crate::model::{DocScope, UpdateParent};

pub(super) fn readdir_projects(
    eng: &Engine,
    ctx: OpCtx,
    team_id: &str,
    key: &str,
) -> FsResult<Vec<ChildEntry>> {
    let projects = eng.repo.projects(ctx, team_id)?;
    let names =
        dedup_names(projects.iter().map(|p| slug_or(&p.name, Some(&p.slug), &p.id)));
    Ok(projects
        .into_iter()
        .zip(names)
        .map(|(project, name)| {
            ChildEntry::new(
                name,
                Node::ProjectDir {
                    project_id: project.id,
                    team_id: team_id.to_string(),
                    key: key.to_string(),
                },
            )
        })
        .collect())
}

pub(super) fn readdir_project(
    project_id: &str,
    _team_id: &str,
    _key: &str,
) -> FsResult<Vec<ChildEntry>> {
    let project_id = project_id.to_string();
    Ok(vec![
        ChildEntry::new(".project.md", Node::ProjectInfo { project_id: project_id.clone() }),
        ChildEntry::new("docs", Node::DocsDir { scope: DocScope::Project(project_id.clone()) }),
        ChildEntry::new("milestones", Node::MilestonesDir { project_id: project_id.clone() }),
        ChildEntry::new(
            "updates",
            Node::UpdatesDir { parent: UpdateParent::Project(project_id) },
        ),
    ])
}

pub(super) fn readdir_milestones(
    eng: &Engine,
    ctx: OpCtx,
    project_id: &str,
) -> FsResult<Vec<ChildEntry>> {
    let milestones = eng.repo.milestones(ctx, project_id)?;
    let names = dedup_names(milestones.iter().map(|m| format!("{}.md", name_style(&m.name))));
    let mut entries: Vec<ChildEntry> = milestones
        .into_iter()
        .zip(names)
        .map(|(milestone, name)| {
            ChildEntry::new(name, Node::MilestoneFile { milestone_id: milestone.id })
        })
        .collect();
    entries.push(ChildEntry::new(
        "_create",
        Node::Trigger(TriggerKind::Milestone { project_id: project_id.to_string(), name: None }),
    ));
    Ok(entries)
}

pub(super) fn readdir_updates(
    eng: &Engine,
    ctx: OpCtx,
    parent: &UpdateParent,
) -> FsResult<Vec<ChildEntry>> {
    let updates = eng.repo.updates(ctx, parent)?;
    let mut entries: Vec<ChildEntry> = updates
        .iter()
        .enumerate()
        .map(|(i, update)| {
            ChildEntry::new(
                update_file_name(i + 1, update),
                Node::UpdateFile { update_id: update.id.clone() },
            )
        })
        .collect();
    entries.push(ChildEntry::new(
        "new.md",
        Node::Trigger(TriggerKind::Update { parent: parent.clone() }),
    ));
    Ok(entries)
}
