//! `initiatives/`: initiative directories, project symlinks, updates.

use super::ChildEntry;
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::name::{dedup_names, project_link_target, slug_or};
use crate::fs::node::Node;
use crate::model::UpdateParent;

/// Components between `initiatives/<slug>/projects/` and the root.
const INITIATIVE_PROJECTS_DEPTH: usize = 3;

pub(super) fn readdir_initiatives(eng: &Engine, ctx: OpCtx) -> FsResult<Vec<ChildEntry>> {
    let initiatives = eng.repo.initiatives(ctx)?;
    let names =
        dedup_names(initiatives.iter().map(|i| slug_or(&i.name, Some(&i.slug), &i.id)));
    Ok(initiatives
        .into_iter()
        .zip(names)
        .map(|(initiative, slug)| {
            ChildEntry::new(
                slug.clone(),
                Node::InitiativeDir { initiative_id: initiative.id, slug },
            )
        })
        .collect())
}

pub(super) fn readdir_initiative(initiative_id: &str, _slug: &str) -> FsResult<Vec<ChildEntry>> {
    let initiative_id = initiative_id.to_string();
    Ok(vec![
        ChildEntry::new(
            "initiative.md",
            Node::InitiativeInfo { initiative_id: initiative_id.clone() },
        ),
        ChildEntry::new(
            "projects",
            Node::InitiativeProjectsDir { initiative_id: initiative_id.clone() },
        ),
        ChildEntry::new(
            "updates",
            Node::UpdatesDir { parent: UpdateParent::Initiative(initiative_id) },
        ),
    ])
}

/// Project symlinks resolve the owning team lazily; projects whose team
/// is unknown are skipped rather than dangled.
pub(super) fn readdir_initiative_projects(
    eng: &Engine,
    ctx: OpCtx,
    initiative_id: &str,
) -> FsResult<Vec<ChildEntry>> {
    let projects = eng.repo.initiative_projects(ctx, initiative_id)?;
    let names =
        dedup_names(projects.iter().map(|p| slug_or(&p.name, Some(&p.slug), &p.id)));
    let mut entries = Vec::new();
    for (project, name) in projects.iter().zip(names) {
        let Some(team) = eng.repo.team_by_id(ctx, &project.team_id)? else { continue };
        let slug = slug_or(&project.name, Some(&project.slug), &project.id);
        let target = project_link_target(INITIATIVE_PROJECTS_DEPTH, &team.key, &slug);
        entries.push(ChildEntry::new(name, Node::Symlink { target }));
    }
    Ok(entries)
}
