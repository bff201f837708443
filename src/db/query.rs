//! Read-side selects, one small function per view the tree consumes.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use super::{Cache, CacheResult};
use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Health, Initiative, Issue, Label,
    Milestone, Project, Relation, RelationType, State, StateType, Team, Update, UpdateParent, User,
};

fn conversion_err(e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

fn get_dt(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(conversion_err)
}

fn get_dt_opt(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(col)?;
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(conversion_err)
        })
        .transpose()
}

fn get_date_opt(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let value: Option<String> = row.get(col)?;
    value.map(|s| s.parse::<NaiveDate>().map_err(conversion_err)).transpose()
}

fn get_history(row: &Row<'_>, col: &str) -> rusqlite::Result<Vec<i64>> {
    let value: String = row.get(col)?;
    if value.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&value).map_err(conversion_err)
}

fn row_to_team(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get("id")?,
        key: row.get("key")?,
        name: row.get("name")?,
        icon: row.get("icon")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        active: row.get("active")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<State> {
    let state_type: String = row.get("state_type")?;
    Ok(State {
        id: row.get("id")?,
        team_id: row.get("team_id")?,
        name: row.get("name")?,
        state_type: StateType::parse(&state_type).unwrap_or(StateType::Backlog),
    })
}

fn row_to_label(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get("id")?,
        team_id: row.get("team_id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        description: row.get("description")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get("id")?,
        identifier: row.get("identifier")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get::<_, i64>("priority")? as u8,
        due_date: get_date_opt(row, "due_date")?,
        estimate: row.get("estimate")?,
        team_id: row.get("team_id")?,
        state_id: row.get("state_id")?,
        assignee_id: row.get("assignee_id")?,
        creator_id: row.get("creator_id")?,
        project_id: row.get("project_id")?,
        milestone_id: row.get("milestone_id")?,
        cycle_id: row.get("cycle_id")?,
        parent_id: row.get("parent_id")?,
        label_ids: Vec::new(),
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        team_id: row.get("team_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        description: row.get("description")?,
        state: row.get("state")?,
        start_date: get_date_opt(row, "start_date")?,
        target_date: get_date_opt(row, "target_date")?,
        lead_id: row.get("lead_id")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_cycle(row: &Row<'_>) -> rusqlite::Result<Cycle> {
    Ok(Cycle {
        id: row.get("id")?,
        team_id: row.get("team_id")?,
        number: row.get("number")?,
        name: row.get("name")?,
        starts_at: get_dt(row, "starts_at")?,
        ends_at: get_dt(row, "ends_at")?,
        issue_count_history: get_history(row, "issue_count_history")?,
        completed_count_history: get_history(row, "completed_count_history")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        issue_id: row.get("issue_id")?,
        body: row.get("body")?,
        author_id: row.get("author_id")?,
        edited_at: get_dt_opt(row, "edited_at")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let team_id: Option<String> = row.get("team_id")?;
    let issue_id: Option<String> = row.get("issue_id")?;
    let project_id: Option<String> = row.get("project_id")?;
    let scope = if let Some(id) = issue_id {
        DocScope::Issue(id)
    } else if let Some(id) = project_id {
        DocScope::Project(id)
    } else {
        DocScope::Team(team_id.unwrap_or_default())
    };
    Ok(Document {
        id: row.get("id")?,
        scope,
        title: row.get("title")?,
        slug: row.get("slug")?,
        content: row.get("content")?,
        icon: row.get("icon")?,
        color: row.get("color")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_milestone(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        target_date: get_date_opt(row, "target_date")?,
        sort_order: row.get("sort_order")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_update(row: &Row<'_>) -> rusqlite::Result<Update> {
    let project_id: Option<String> = row.get("project_id")?;
    let initiative_id: Option<String> = row.get("initiative_id")?;
    let parent = match (project_id, initiative_id) {
        (Some(id), _) => UpdateParent::Project(id),
        (None, Some(id)) => UpdateParent::Initiative(id),
        (None, None) => UpdateParent::Project(String::new()),
    };
    let health: String = row.get("health")?;
    Ok(Update {
        id: row.get("id")?,
        parent,
        body: row.get("body")?,
        health: Health::parse(&health).unwrap_or(Health::OnTrack),
        author_id: row.get("author_id")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_initiative(row: &Row<'_>) -> rusqlite::Result<Initiative> {
    Ok(Initiative {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        status: row.get("status")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
        target_date: get_date_opt(row, "target_date")?,
        owner_id: row.get("owner_id")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_attachment(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        issue_id: row.get("issue_id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        subtitle: row.get("subtitle")?,
        source_type: row.get("source_type")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<EmbeddedFile> {
    Ok(EmbeddedFile {
        id: row.get("id")?,
        issue_id: row.get("issue_id")?,
        filename: row.get("filename")?,
        url: row.get("url")?,
        size: row.get::<_, i64>("size")? as u64,
        cache_path: row.get("cache_path")?,
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn row_to_relation(row: &Row<'_>) -> rusqlite::Result<Relation> {
    let relation_type: String = row.get("relation_type")?;
    Ok(Relation {
        id: row.get("id")?,
        issue_id: row.get("issue_id")?,
        related_issue_id: row.get("related_issue_id")?,
        relation_type: RelationType::parse(&relation_type).unwrap_or(RelationType::Related),
        created_at: get_dt(row, "created_at")?,
        updated_at: get_dt(row, "updated_at")?,
    })
}

fn load_labels_for(conn: &Connection, issue: &mut Issue) -> rusqlite::Result<()> {
    let mut stmt =
        conn.prepare_cached("SELECT label_id FROM issue_labels WHERE issue_id = ?1")?;
    let ids = stmt.query_map(params![issue.id], |row| row.get::<_, String>(0))?;
    issue.label_ids = ids.collect::<rusqlite::Result<Vec<_>>>()?;
    issue.label_ids.sort();
    Ok(())
}

fn issue_list(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Issue>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, row_to_issue)?;
    let mut issues = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for issue in &mut issues {
        load_labels_for(conn, issue)?;
    }
    Ok(issues)
}

impl Cache {
    pub fn teams(&self) -> CacheResult<Vec<Team>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM teams ORDER BY key")?;
            let rows = stmt.query_map([], row_to_team)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn team_by_id(&self, team_id: &str) -> CacheResult<Option<Team>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM teams WHERE id = ?1")?;
            Ok(stmt.query_row(params![team_id], row_to_team).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn team_by_key(&self, key: &str) -> CacheResult<Option<Team>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM teams WHERE key = ?1")?;
            Ok(stmt.query_row(params![key], row_to_team).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn users(&self) -> CacheResult<Vec<User>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM users ORDER BY display_name")?;
            let rows = stmt.query_map([], row_to_user)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn user_by_id(&self, user_id: &str) -> CacheResult<Option<User>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM users WHERE id = ?1")?;
            Ok(stmt.query_row(params![user_id], row_to_user).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn states_for_team(&self, team_id: &str) -> CacheResult<Vec<State>> {
        self.with(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT * FROM states WHERE team_id = ?1 ORDER BY name")?;
            let rows = stmt.query_map(params![team_id], row_to_state)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn labels_for_team(&self, team_id: &str) -> CacheResult<Vec<Label>> {
        self.with(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT * FROM labels WHERE team_id = ?1 ORDER BY name")?;
            let rows = stmt.query_map(params![team_id], row_to_label)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn issues_for_team(&self, team_id: &str) -> CacheResult<Vec<Issue>> {
        self.with(|conn| {
            Ok(issue_list(
                conn,
                "SELECT * FROM issues WHERE team_id = ?1 ORDER BY identifier",
                params![team_id],
            )?)
        })
    }

    pub fn issue_by_id(&self, issue_id: &str) -> CacheResult<Option<Issue>> {
        self.with(|conn| {
            let mut issues =
                issue_list(conn, "SELECT * FROM issues WHERE id = ?1", params![issue_id])?;
            Ok(issues.pop())
        })
    }

    pub fn issue_by_identifier(&self, identifier: &str) -> CacheResult<Option<Issue>> {
        self.with(|conn| {
            let mut issues = issue_list(
                conn,
                "SELECT * FROM issues WHERE identifier = ?1",
                params![identifier],
            )?;
            Ok(issues.pop())
        })
    }

    pub fn issues_assigned(&self, user_id: &str) -> CacheResult<Vec<Issue>> {
        self.with(|conn| {
            Ok(issue_list(
                conn,
                "SELECT * FROM issues WHERE assignee_id = ?1 ORDER BY identifier",
                params![user_id],
            )?)
        })
    }

    pub fn issues_created(&self, user_id: &str) -> CacheResult<Vec<Issue>> {
        self.with(|conn| {
            Ok(issue_list(
                conn,
                "SELECT * FROM issues WHERE creator_id = ?1 ORDER BY identifier",
                params![user_id],
            )?)
        })
    }

    pub fn issues_for_project(&self, project_id: &str) -> CacheResult<Vec<Issue>> {
        self.with(|conn| {
            Ok(issue_list(
                conn,
                "SELECT * FROM issues WHERE project_id = ?1 ORDER BY identifier",
                params![project_id],
            )?)
        })
    }

    pub fn children_of(&self, issue_id: &str) -> CacheResult<Vec<Issue>> {
        self.with(|conn| {
            Ok(issue_list(
                conn,
                "SELECT * FROM issues WHERE parent_id = ?1 ORDER BY identifier",
                params![issue_id],
            )?)
        })
    }

    pub fn projects_for_team(&self, team_id: &str) -> CacheResult<Vec<Project>> {
        self.with(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT * FROM projects WHERE team_id = ?1 ORDER BY name")?;
            let rows = stmt.query_map(params![team_id], row_to_project)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn project_by_id(&self, project_id: &str) -> CacheResult<Option<Project>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM projects WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![project_id], row_to_project)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn cycles_for_team(&self, team_id: &str) -> CacheResult<Vec<Cycle>> {
        self.with(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT * FROM cycles WHERE team_id = ?1 ORDER BY number")?;
            let rows = stmt.query_map(params![team_id], row_to_cycle)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn comments_for_issue(&self, issue_id: &str) -> CacheResult<Vec<Comment>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM comments WHERE issue_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![issue_id], row_to_comment)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn documents_for_scope(&self, scope: &DocScope) -> CacheResult<Vec<Document>> {
        self.with(|conn| {
            let (column, id) = match scope {
                DocScope::Team(id) => ("team_id", id),
                DocScope::Issue(id) => ("issue_id", id),
                DocScope::Project(id) => ("project_id", id),
            };
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT * FROM documents WHERE {column} = ?1 ORDER BY title, id"
            ))?;
            let rows = stmt.query_map(params![id], row_to_document)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn document_by_id(&self, doc_id: &str) -> CacheResult<Option<Document>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM documents WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![doc_id], row_to_document)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn milestones_for_project(&self, project_id: &str) -> CacheResult<Vec<Milestone>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM milestones WHERE project_id = ?1 ORDER BY sort_order, name",
            )?;
            let rows = stmt.query_map(params![project_id], row_to_milestone)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn updates_for_parent(&self, parent: &UpdateParent) -> CacheResult<Vec<Update>> {
        self.with(|conn| {
            let (column, id) = match parent {
                UpdateParent::Project(id) => ("project_id", id),
                UpdateParent::Initiative(id) => ("initiative_id", id),
            };
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT * FROM updates WHERE {column} = ?1 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map(params![id], row_to_update)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn initiatives(&self) -> CacheResult<Vec<Initiative>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM initiatives ORDER BY name")?;
            let rows = stmt.query_map([], row_to_initiative)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn initiative_by_id(&self, initiative_id: &str) -> CacheResult<Option<Initiative>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM initiatives WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![initiative_id], row_to_initiative)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn projects_for_initiative(&self, initiative_id: &str) -> CacheResult<Vec<Project>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT p.* FROM projects p
                 JOIN initiative_projects ip ON ip.project_id = p.id
                 WHERE ip.initiative_id = ?1 ORDER BY p.name",
            )?;
            let rows = stmt.query_map(params![initiative_id], row_to_project)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn attachments_for_issue(&self, issue_id: &str) -> CacheResult<Vec<Attachment>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM attachments WHERE issue_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![issue_id], row_to_attachment)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn files_for_issue(&self, issue_id: &str) -> CacheResult<Vec<EmbeddedFile>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM files WHERE issue_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![issue_id], row_to_file)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn file_by_id(&self, file_id: &str) -> CacheResult<Option<EmbeddedFile>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM files WHERE id = ?1")?;
            Ok(stmt.query_row(params![file_id], row_to_file).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn label_by_id(&self, label_id: &str) -> CacheResult<Option<Label>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM labels WHERE id = ?1")?;
            Ok(stmt.query_row(params![label_id], row_to_label).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn cycle_by_id(&self, cycle_id: &str) -> CacheResult<Option<Cycle>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM cycles WHERE id = ?1")?;
            Ok(stmt.query_row(params![cycle_id], row_to_cycle).map(Some).or_else(none_on_missing)?)
        })
    }

    pub fn comment_by_id(&self, comment_id: &str) -> CacheResult<Option<Comment>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM comments WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![comment_id], row_to_comment)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn milestone_by_id(&self, milestone_id: &str) -> CacheResult<Option<Milestone>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM milestones WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![milestone_id], row_to_milestone)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn update_by_id(&self, update_id: &str) -> CacheResult<Option<Update>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM updates WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![update_id], row_to_update)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn attachment_by_id(&self, attachment_id: &str) -> CacheResult<Option<Attachment>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM attachments WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![attachment_id], row_to_attachment)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn relation_by_id(&self, relation_id: &str) -> CacheResult<Option<Relation>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM relations WHERE id = ?1")?;
            Ok(stmt
                .query_row(params![relation_id], row_to_relation)
                .map(Some)
                .or_else(none_on_missing)?)
        })
    }

    pub fn relations_for_issue(&self, issue_id: &str) -> CacheResult<Vec<Relation>> {
        self.with(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM relations WHERE issue_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![issue_id], row_to_relation)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

fn none_on_missing<T>(e: rusqlite::Error) -> rusqlite::Result<Option<T>> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn team(id: &str, key: &str) -> Team {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Team {
            id: id.into(),
            key: key.into(),
            name: format!("Team {key}"),
            icon: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn issue(id: &str, identifier: &str, team_id: &str) -> Issue {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        Issue {
            id: id.into(),
            identifier: identifier.into(),
            title: "A title".into(),
            description: String::new(),
            priority: 2,
            due_date: Some("2026-02-01".parse().unwrap()),
            estimate: Some(3),
            team_id: team_id.into(),
            state_id: "state-1".into(),
            assignee_id: None,
            creator_id: None,
            project_id: None,
            milestone_id: None,
            cycle_id: None,
            parent_id: None,
            label_ids: vec!["label-1".into(), "label-2".into()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issue_round_trips_through_cache() {
        let cache = Cache::open_in_memory().unwrap();
        cache.upsert_team(&team("team-1", "ENG")).unwrap();
        let original = issue("issue-1", "ENG-1", "team-1");
        cache.upsert_issue(&original).unwrap();

        let loaded = cache.issue_by_identifier("ENG-1").unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn replace_team_issues_drops_stale_rows(){
        let cache = Cache::open_in_memory().unwrap();
        cache.upsert_issue(&issue("issue-1", "ENG-1", "team-1")).unwrap();
        cache.upsert_issue(&issue("issue-2", "ENG-2", "team-1")).unwrap();

        cache.replace_team_issues("team-1", &[issue("issue-2", "ENG-2", "team-1")]).unwrap();
        let left = cache.issues_for_team("team-1").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].identifier, "ENG-2");
    }

    #[test]
    fn missing_lookup_is_none() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.issue_by_identifier("ENG-404").unwrap().is_none());
        assert!(cache.team_by_key("NOPE").unwrap().is_none());
    }

    #[test]
    fn children_query_follows_parent_id() {
        let cache = Cache::open_in_memory().unwrap();
        let mut child = issue("issue-2", "ENG-2", "team-1");
        child.parent_id = Some("issue-1".into());
        cache.upsert_issue(&issue("issue-1", "ENG-1", "team-1")).unwrap();
        cache.upsert_issue(&child).unwrap();

        let children = cache.children_of("issue-1").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].identifier, "ENG-2");
    }
}
