//! Human token → backend id translation.
//!
//! Runs before any mutation is sent, so an unresolved token fails the
//! write with `invalid argument` and nothing reaches the backend. The
//! matching policy is uniform: exact match wins, then case-insensitive;
//! only then is the token unknown.

use super::Engine;
use super::name::user_handle;
use crate::api::OpCtx;
use crate::error::{FsError, FsResult};

pub struct Resolver<'a> {
    eng: &'a Engine,
    ctx: OpCtx,
}

impl<'a> Resolver<'a> {
    pub fn new(eng: &'a Engine, ctx: OpCtx) -> Self {
        Self { eng, ctx }
    }

    fn unknown(kind: &str, token: &str) -> FsError {
        FsError::invalid(format!("unknown {kind}: {token}"))
    }

    /// Workflow state, scoped to the issue's team.
    pub fn state_id(&self, team_id: &str, name: &str) -> FsResult<String> {
        let states = self.eng.repo.states(self.ctx, team_id)?;
        if let Some(state) = states.iter().find(|s| s.name == name) {
            return Ok(state.id.clone());
        }
        states
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id.clone())
            .ok_or_else(|| Self::unknown("status", name))
    }

    /// Assignee: exact email, case-insensitive email, exact name, exact
    /// display name, then case-insensitive name/display name.
    pub fn user_id(&self, token: &str) -> FsResult<String> {
        let users = self.eng.repo.users(self.ctx)?;
        let pick = users
            .iter()
            .find(|u| u.email == token)
            .or_else(|| users.iter().find(|u| u.email.eq_ignore_ascii_case(token)))
            .or_else(|| users.iter().find(|u| u.name == token))
            .or_else(|| users.iter().find(|u| u.display_name == token))
            .or_else(|| {
                users.iter().find(|u| {
                    u.name.eq_ignore_ascii_case(token)
                        || u.display_name.eq_ignore_ascii_case(token)
                        || user_handle(u).eq_ignore_ascii_case(token)
                })
            });
        pick.map(|u| u.id.clone()).ok_or_else(|| Self::unknown("assignee", token))
    }

    /// Label set: case-insensitive per name; every unresolved name is
    /// reported, not just the first.
    pub fn label_ids(&self, team_id: &str, names: &[String]) -> FsResult<Vec<String>> {
        let labels = self.eng.repo.labels(self.ctx, team_id)?;
        let mut ids = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            let found = labels
                .iter()
                .find(|l| l.name == *name)
                .or_else(|| labels.iter().find(|l| l.name.eq_ignore_ascii_case(name)));
            match found {
                Some(label) => ids.push(label.id.clone()),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(FsError::invalid(format!("unknown label: {}", missing.join(", "))));
        }
        Ok(ids)
    }

    pub fn project_id(&self, team_id: &str, name: &str) -> FsResult<String> {
        let projects = self.eng.repo.projects(self.ctx, team_id)?;
        if let Some(project) = projects.iter().find(|p| p.name == name) {
            return Ok(project.id.clone());
        }
        projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.id.clone())
            .ok_or_else(|| Self::unknown("project", name))
    }

    pub fn milestone_id(&self, project_id: &str, name: &str) -> FsResult<String> {
        let milestones = self.eng.repo.milestones(self.ctx, project_id)?;
        if let Some(milestone) = milestones.iter().find(|m| m.name == name) {
            return Ok(milestone.id.clone());
        }
        milestones
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| m.id.clone())
            .ok_or_else(|| Self::unknown("milestone", name))
    }

    /// Cycles match by name only; a bare number token is not resolved
    /// against cycle numbers.
    pub fn cycle_id(&self, team_id: &str, name: &str) -> FsResult<String> {
        let cycles = self.eng.repo.cycles(self.ctx, team_id)?;
        let by_name = |exact: bool| {
            cycles.iter().find(|c| match &c.name {
                Some(n) if exact => n == name,
                Some(n) => n.eq_ignore_ascii_case(name),
                None => false,
            })
        };
        by_name(true)
            .or_else(|| by_name(false))
            .map(|c| c.id.clone())
            .ok_or_else(|| Self::unknown("cycle", name))
    }

    /// Parent issue by exact identifier, looked up globally.
    pub fn parent_issue_id(&self, identifier: &str) -> FsResult<String> {
        self.eng
            .repo
            .issue_by_identifier(self.ctx, identifier)?
            .map(|i| i.id)
            .ok_or_else(|| Self::unknown("parent", identifier))
    }

    pub fn initiative_id(&self, name: &str) -> FsResult<String> {
        let initiatives = self.eng.repo.initiatives(self.ctx)?;
        if let Some(initiative) = initiatives.iter().find(|i| i.name == name) {
            return Ok(initiative.id.clone());
        }
        initiatives
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
            .map(|i| i.id.clone())
            .ok_or_else(|| Self::unknown("initiative", name))
    }
}
