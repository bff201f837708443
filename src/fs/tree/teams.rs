//! `teams/` and the per-team directory.

use super::ChildEntry;
use crate::api::OpCtx;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::node::{IssueScope, Node};
use crate::model::DocScope;

pub(super) fn readdir_teams(eng: &Engine, ctx: OpCtx) -> FsResult<Vec<ChildEntry>> {
    let teams = eng.repo.teams(ctx)?;
    Ok(teams
        .into_iter()
        .map(|team| {
            ChildEntry::new(
                team.key.clone(),
                Node::TeamDir { team_id: team.id, key: team.key },
            )
        })
        .collect())
}

pub(super) fn readdir_team(team_id: &str, key: &str) -> FsResult<Vec<ChildEntry>> {
    let team_id = team_id.to_string();
    let key = key.to_string();
    Ok(vec![
        ChildEntry::new("team.md", Node::TeamInfo { team_id: team_id.clone() }),
        ChildEntry::new("states.md", Node::StatesFile { team_id: team_id.clone() }),
        ChildEntry::new("labels.md", Node::LabelsInfo { team_id: team_id.clone() }),
        ChildEntry::new(
            "by",
            Node::FilterRoot { team_id: team_id.clone(), key: key.clone() },
        ),
        ChildEntry::new(
            "cycles",
            Node::CyclesDir { team_id: team_id.clone(), key: key.clone() },
        ),
        ChildEntry::new(
            "projects",
            Node::ProjectsDir { team_id: team_id.clone(), key: key.clone() },
        ),
        ChildEntry::new(
            "issues",
            Node::IssuesDir { team_id: team_id.clone(), key: key.clone() },
        ),
        ChildEntry::new("docs", Node::DocsDir { scope: DocScope::Team(team_id.clone()) }),
        ChildEntry::new("labels", Node::LabelsDir { team_id: team_id.clone() }),
        ChildEntry::new(
            "search",
            Node::SearchRootDir { scope: IssueScope::Team { team_id, key } },
        ),
    ])
}
