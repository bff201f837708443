//! Per-entity upsert and delete primitives.
//!
//! Upserts are `INSERT ... ON CONFLICT(id) DO UPDATE` so that refreshing a
//! view never loses a row another view also depends on. Views that own
//! their rows outright (a team's issues, an issue's comments, ...) have
//! `replace_*` variants that clear the owned subset first so remotely
//! deleted records disappear from listings.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};

use super::{Cache, CacheResult};
use crate::model::{
    Attachment, Comment, Cycle, DocScope, Document, EmbeddedFile, Initiative, Issue, Label,
    Milestone, Project, Relation, State, Team, Update, UpdateParent, User,
};

pub(super) fn dt(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(super) fn date(value: &Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.to_string())
}

impl Cache {
    pub fn upsert_team(&self, team: &Team) -> CacheResult<()> {
        self.with(|conn| upsert_team(conn, team))
    }

    pub fn replace_teams(&self, teams: &[Team]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM teams", [])?;
            for team in teams {
                upsert_team(conn, team)?;
            }
            Ok(())
        })
    }

    pub fn upsert_user(&self, user: &User) -> CacheResult<()> {
        self.with(|conn| upsert_user(conn, user))
    }

    pub fn replace_users(&self, users: &[User]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM users", [])?;
            for user in users {
                upsert_user(conn, user)?;
            }
            Ok(())
        })
    }

    pub fn replace_team_states(&self, team_id: &str, states: &[State]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM states WHERE team_id = ?1", params![team_id])?;
            for state in states {
                conn.execute(
                    "INSERT INTO states (id, team_id, name, state_type)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                         team_id = excluded.team_id,
                         name = excluded.name,
                         state_type = excluded.state_type",
                    params![state.id, state.team_id, state.name, state.state_type.as_str()],
                )?;
            }
            Ok(())
        })
    }

    pub fn upsert_label(&self, label: &Label) -> CacheResult<()> {
        self.with(|conn| upsert_label(conn, label))
    }

    pub fn replace_team_labels(&self, team_id: &str, labels: &[Label]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM labels WHERE team_id = ?1", params![team_id])?;
            for label in labels {
                upsert_label(conn, label)?;
            }
            Ok(())
        })
    }

    pub fn delete_label(&self, label_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM labels WHERE id = ?1", params![label_id])?;
            conn.execute("DELETE FROM issue_labels WHERE label_id = ?1", params![label_id])?;
            Ok(())
        })
    }

    pub fn upsert_issue(&self, issue: &Issue) -> CacheResult<()> {
        self.with(|conn| upsert_issue(conn, issue))
    }

    pub fn upsert_issues(&self, issues: &[Issue]) -> CacheResult<()> {
        self.with(|conn| {
            for issue in issues {
                upsert_issue(conn, issue)?;
            }
            Ok(())
        })
    }

    pub fn replace_team_issues(&self, team_id: &str, issues: &[Issue]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute(
                "DELETE FROM issue_labels WHERE issue_id IN
                     (SELECT id FROM issues WHERE team_id = ?1)",
                params![team_id],
            )?;
            conn.execute("DELETE FROM issues WHERE team_id = ?1", params![team_id])?;
            for issue in issues {
                upsert_issue(conn, issue)?;
            }
            Ok(())
        })
    }

    pub fn delete_issue(&self, issue_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM issues WHERE id = ?1", params![issue_id])?;
            conn.execute("DELETE FROM issue_labels WHERE issue_id = ?1", params![issue_id])?;
            Ok(())
        })
    }

    pub fn replace_team_projects(&self, team_id: &str, projects: &[Project]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM projects WHERE team_id = ?1", params![team_id])?;
            for project in projects {
                upsert_project(conn, project)?;
            }
            Ok(())
        })
    }

    pub fn upsert_project(&self, project: &Project) -> CacheResult<()> {
        self.with(|conn| upsert_project(conn, project))
    }

    pub fn replace_team_cycles(&self, team_id: &str, cycles: &[Cycle]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM cycles WHERE team_id = ?1", params![team_id])?;
            for cycle in cycles {
                conn.execute(
                    "INSERT INTO cycles (id, team_id, number, name, starts_at, ends_at,
                         issue_count_history, completed_count_history, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                         team_id = excluded.team_id,
                         number = excluded.number,
                         name = excluded.name,
                         starts_at = excluded.starts_at,
                         ends_at = excluded.ends_at,
                         issue_count_history = excluded.issue_count_history,
                         completed_count_history = excluded.completed_count_history,
                         created_at = excluded.created_at,
                         updated_at = excluded.updated_at",
                    params![
                        cycle.id,
                        cycle.team_id,
                        cycle.number,
                        cycle.name,
                        dt(&cycle.starts_at),
                        dt(&cycle.ends_at),
                        serde_json::to_string(&cycle.issue_count_history).unwrap_or_default(),
                        serde_json::to_string(&cycle.completed_count_history).unwrap_or_default(),
                        dt(&cycle.created_at),
                        dt(&cycle.updated_at),
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn upsert_comment(&self, comment: &Comment) -> CacheResult<()> {
        self.with(|conn| upsert_comment(conn, comment))
    }

    pub fn replace_issue_comments(&self, issue_id: &str, comments: &[Comment]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM comments WHERE issue_id = ?1", params![issue_id])?;
            for comment in comments {
                upsert_comment(conn, comment)?;
            }
            Ok(())
        })
    }

    pub fn delete_comment(&self, comment_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
            Ok(())
        })
    }

    pub fn upsert_document(&self, doc: &Document) -> CacheResult<()> {
        self.with(|conn| upsert_document(conn, doc))
    }

    pub fn replace_scope_documents(&self, scope: &DocScope, docs: &[Document]) -> CacheResult<()> {
        self.with(|conn| {
            let (column, id) = scope_column(scope);
            conn.execute(
                &format!("DELETE FROM documents WHERE {column} = ?1"),
                params![id],
            )?;
            for doc in docs {
                upsert_document(conn, doc)?;
            }
            Ok(())
        })
    }

    pub fn delete_document(&self, doc_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM documents WHERE id = ?1", params![doc_id])?;
            Ok(())
        })
    }

    pub fn upsert_milestone(&self, milestone: &Milestone) -> CacheResult<()> {
        self.with(|conn| upsert_milestone(conn, milestone))
    }

    pub fn replace_project_milestones(
        &self,
        project_id: &str,
        milestones: &[Milestone],
    ) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM milestones WHERE project_id = ?1", params![project_id])?;
            for milestone in milestones {
                upsert_milestone(conn, milestone)?;
            }
            Ok(())
        })
    }

    pub fn upsert_update(&self, update: &Update) -> CacheResult<()> {
        self.with(|conn| upsert_update(conn, update))
    }

    pub fn replace_parent_updates(
        &self,
        parent: &UpdateParent,
        updates: &[Update],
    ) -> CacheResult<()> {
        self.with(|conn| {
            match parent {
                UpdateParent::Project(id) => {
                    conn.execute("DELETE FROM updates WHERE project_id = ?1", params![id])?
                }
                UpdateParent::Initiative(id) => {
                    conn.execute("DELETE FROM updates WHERE initiative_id = ?1", params![id])?
                }
            };
            for update in updates {
                upsert_update(conn, update)?;
            }
            Ok(())
        })
    }

    pub fn replace_initiatives(&self, initiatives: &[Initiative]) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM initiatives", [])?;
            for initiative in initiatives {
                conn.execute(
                    "INSERT INTO initiatives (id, name, slug, status, color, icon,
                         target_date, owner_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                         name = excluded.name,
                         slug = excluded.slug,
                         status = excluded.status,
                         color = excluded.color,
                         icon = excluded.icon,
                         target_date = excluded.target_date,
                         owner_id = excluded.owner_id,
                         created_at = excluded.created_at,
                         updated_at = excluded.updated_at",
                    params![
                        initiative.id,
                        initiative.name,
                        initiative.slug,
                        initiative.status,
                        initiative.color,
                        initiative.icon,
                        date(&initiative.target_date),
                        initiative.owner_id,
                        dt(&initiative.created_at),
                        dt(&initiative.updated_at),
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn replace_initiative_projects(
        &self,
        initiative_id: &str,
        projects: &[Project],
    ) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute(
                "DELETE FROM initiative_projects WHERE initiative_id = ?1",
                params![initiative_id],
            )?;
            for project in projects {
                upsert_project(conn, project)?;
                conn.execute(
                    "INSERT OR IGNORE INTO initiative_projects (initiative_id, project_id)
                     VALUES (?1, ?2)",
                    params![initiative_id, project.id],
                )?;
            }
            Ok(())
        })
    }

    pub fn upsert_attachment(&self, attachment: &Attachment) -> CacheResult<()> {
        self.with(|conn| upsert_attachment(conn, attachment))
    }

    pub fn replace_issue_attachments(
        &self,
        issue_id: &str,
        attachments: &[Attachment],
        files: &[EmbeddedFile],
    ) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM attachments WHERE issue_id = ?1", params![issue_id])?;
            for attachment in attachments {
                upsert_attachment(conn, attachment)?;
            }
            for file in files {
                // Preserve a previously learned size and cache path; the
                // fetch that produced `files` only knows the URL.
                conn.execute(
                    "INSERT INTO files (id, issue_id, filename, url, size, cache_path,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                         issue_id = excluded.issue_id,
                         filename = excluded.filename,
                         url = excluded.url,
                         updated_at = excluded.updated_at",
                    params![
                        file.id,
                        file.issue_id,
                        file.filename,
                        file.url,
                        file.size as i64,
                        file.cache_path,
                        dt(&file.created_at),
                        dt(&file.updated_at),
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn delete_attachment(&self, attachment_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM attachments WHERE id = ?1", params![attachment_id])?;
            Ok(())
        })
    }

    pub fn set_file_cache(&self, file_id: &str, path: &str, size: u64) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute(
                "UPDATE files SET cache_path = ?2, size = ?3 WHERE id = ?1",
                params![file_id, path, size as i64],
            )?;
            Ok(())
        })
    }

    pub fn upsert_relation(&self, relation: &Relation) -> CacheResult<()> {
        self.with(|conn| upsert_relation(conn, relation))
    }

    pub fn replace_issue_relations(
        &self,
        issue_id: &str,
        relations: &[Relation],
    ) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM relations WHERE issue_id = ?1", params![issue_id])?;
            for relation in relations {
                upsert_relation(conn, relation)?;
            }
            Ok(())
        })
    }

    pub fn delete_relation(&self, relation_id: &str) -> CacheResult<()> {
        self.with(|conn| {
            conn.execute("DELETE FROM relations WHERE id = ?1", params![relation_id])?;
            Ok(())
        })
    }
}

fn scope_column(scope: &DocScope) -> (&'static str, &str) {
    match scope {
        DocScope::Team(id) => ("team_id", id),
        DocScope::Issue(id) => ("issue_id", id),
        DocScope::Project(id) => ("project_id", id),
    }
}

fn upsert_team(conn: &Connection, team: &Team) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO teams (id, key, name, icon, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             key = excluded.key,
             name = excluded.name,
             icon = excluded.icon,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![team.id, team.key, team.name, team.icon, dt(&team.created_at), dt(&team.updated_at)],
    )?;
    Ok(())
}

fn upsert_user(conn: &Connection, user: &User) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, display_name, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             email = excluded.email,
             display_name = excluded.display_name,
             active = excluded.active,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            user.id,
            user.name,
            user.email,
            user.display_name,
            user.active,
            dt(&user.created_at),
            dt(&user.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_label(conn: &Connection, label: &Label) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO labels (id, team_id, name, color, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             team_id = excluded.team_id,
             name = excluded.name,
             color = excluded.color,
             description = excluded.description,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            label.id,
            label.team_id,
            label.name,
            label.color,
            label.description,
            dt(&label.created_at),
            dt(&label.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_issue(conn: &Connection, issue: &Issue) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO issues (id, identifier, title, description, priority, due_date, estimate,
             team_id, state_id, assignee_id, creator_id, project_id, milestone_id, cycle_id,
             parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(id) DO UPDATE SET
             identifier = excluded.identifier,
             title = excluded.title,
             description = excluded.description,
             priority = excluded.priority,
             due_date = excluded.due_date,
             estimate = excluded.estimate,
             team_id = excluded.team_id,
             state_id = excluded.state_id,
             assignee_id = excluded.assignee_id,
             creator_id = excluded.creator_id,
             project_id = excluded.project_id,
             milestone_id = excluded.milestone_id,
             cycle_id = excluded.cycle_id,
             parent_id = excluded.parent_id,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            issue.id,
            issue.identifier,
            issue.title,
            issue.description,
            issue.priority,
            date(&issue.due_date),
            issue.estimate,
            issue.team_id,
            issue.state_id,
            issue.assignee_id,
            issue.creator_id,
            issue.project_id,
            issue.milestone_id,
            issue.cycle_id,
            issue.parent_id,
            dt(&issue.created_at),
            dt(&issue.updated_at),
        ],
    )?;
    conn.execute("DELETE FROM issue_labels WHERE issue_id = ?1", params![issue.id])?;
    for label_id in &issue.label_ids {
        conn.execute(
            "INSERT OR IGNORE INTO issue_labels (issue_id, label_id) VALUES (?1, ?2)",
            params![issue.id, label_id],
        )?;
    }
    Ok(())
}

fn upsert_project(conn: &Connection, project: &Project) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO projects (id, team_id, name, slug, description, state, start_date,
             target_date, lead_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
             team_id = excluded.team_id,
             name = excluded.name,
             slug = excluded.slug,
             description = excluded.description,
             state = excluded.state,
             start_date = excluded.start_date,
             target_date = excluded.target_date,
             lead_id = excluded.lead_id,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            project.id,
            project.team_id,
            project.name,
            project.slug,
            project.description,
            project.state,
            date(&project.start_date),
            date(&project.target_date),
            project.lead_id,
            dt(&project.created_at),
            dt(&project.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_comment(conn: &Connection, comment: &Comment) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO comments (id, issue_id, body, author_id, edited_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             issue_id = excluded.issue_id,
             body = excluded.body,
             author_id = excluded.author_id,
             edited_at = excluded.edited_at,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            comment.id,
            comment.issue_id,
            comment.body,
            comment.author_id,
            comment.edited_at.as_ref().map(dt),
            dt(&comment.created_at),
            dt(&comment.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_document(conn: &Connection, doc: &Document) -> CacheResult<()> {
    let (team_id, issue_id, project_id) = match &doc.scope {
        DocScope::Team(id) => (Some(id.as_str()), None, None),
        DocScope::Issue(id) => (None, Some(id.as_str()), None),
        DocScope::Project(id) => (None, None, Some(id.as_str())),
    };
    conn.execute(
        "INSERT INTO documents (id, team_id, issue_id, project_id, title, slug, content,
             icon, color, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
             team_id = excluded.team_id,
             issue_id = excluded.issue_id,
             project_id = excluded.project_id,
             title = excluded.title,
             slug = excluded.slug,
             content = excluded.content,
             icon = excluded.icon,
             color = excluded.color,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            doc.id,
            team_id,
            issue_id,
            project_id,
            doc.title,
            doc.slug,
            doc.content,
            doc.icon,
            doc.color,
            dt(&doc.created_at),
            dt(&doc.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_milestone(conn: &Connection, milestone: &Milestone) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO milestones (id, project_id, name, description, target_date, sort_order,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             project_id = excluded.project_id,
             name = excluded.name,
             description = excluded.description,
             target_date = excluded.target_date,
             sort_order = excluded.sort_order,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            milestone.id,
            milestone.project_id,
            milestone.name,
            milestone.description,
            date(&milestone.target_date),
            milestone.sort_order,
            dt(&milestone.created_at),
            dt(&milestone.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_update(conn: &Connection, update: &Update) -> CacheResult<()> {
    let (project_id, initiative_id) = match &update.parent {
        UpdateParent::Project(id) => (Some(id.as_str()), None),
        UpdateParent::Initiative(id) => (None, Some(id.as_str())),
    };
    conn.execute(
        "INSERT INTO updates (id, project_id, initiative_id, body, health, author_id,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             project_id = excluded.project_id,
             initiative_id = excluded.initiative_id,
             body = excluded.body,
             health = excluded.health,
             author_id = excluded.author_id,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            update.id,
            project_id,
            initiative_id,
            update.body,
            update.health.as_str(),
            update.author_id,
            dt(&update.created_at),
            dt(&update.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_attachment(conn: &Connection, attachment: &Attachment) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO attachments (id, issue_id, title, url, subtitle, source_type,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             issue_id = excluded.issue_id,
             title = excluded.title,
             url = excluded.url,
             subtitle = excluded.subtitle,
             source_type = excluded.source_type,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            attachment.id,
            attachment.issue_id,
            attachment.title,
            attachment.url,
            attachment.subtitle,
            attachment.source_type,
            dt(&attachment.created_at),
            dt(&attachment.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_relation(conn: &Connection, relation: &Relation) -> CacheResult<()> {
    conn.execute(
        "INSERT INTO relations (id, issue_id, related_issue_id, relation_type,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             issue_id = excluded.issue_id,
             related_issue_id = excluded.related_issue_id,
             relation_type = excluded.relation_type,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            relation.id,
            relation.issue_id,
            relation.related_issue_id,
            relation.relation_type.as_str(),
            dt(&relation.created_at),
            dt(&relation.updated_at),
        ],
    )?;
    Ok(())
}
