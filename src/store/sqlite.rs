use crate::lead::{Lead, NewLead, Plan, University};
use crate::store::queries;
use crate::store::{LeadStore, StoreError};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                conn.execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl LeadStore for SqliteStore {
    fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let created_at = Utc::now();

        let inserted = conn.execute(
            queries::INSERT_LEAD,
            params![
                &lead.email,
                &lead.name,
                &lead.phone,
                lead.university,
                lead.selected_plan,
                created_at
            ],
        );

        match inserted {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                Ok(lead.into_lead(Some(id.to_string()), created_at))
            }
            Err(error) if is_unique_violation(&error) => {
                Err(StoreError::Duplicate { email: lead.email })
            }
            Err(error) => Err(anyhow::Error::new(error)
                .context("Failed to insert lead")
                .into()),
        }
    }

    fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statement = conn
            .prepare(queries::SELECT_LEADS)
            .context("Failed to prepare lead query")?;

        let rows = statement
            .query_map([], |row| {
                Ok(Lead {
                    id: Some(row.get::<_, i64>(0)?.to_string()),
                    email: row.get(1)?,
                    name: row.get(2)?,
                    phone: row.get(3)?,
                    university: row.get(4)?,
                    selected_plan: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .context("Failed to query leads")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read lead rows")?;

        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl ToSql for Plan {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Plan {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: anyhow::Error| FromSqlError::Other(error.into()))
    }
}

impl ToSql for University {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for University {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: anyhow::Error| FromSqlError::Other(error.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::lead::{NewLead, Plan, University};
    use crate::store::{LeadStore, StoreError};

    fn new_lead(email: &str, plan: Plan) -> NewLead {
        NewLead {
            email: email.to_string(),
            name: Some("Ada".to_string()),
            phone: None,
            university: University::Imperial,
            selected_plan: plan,
        }
    }

    #[test]
    fn persists_leads_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db").join("leads.db");

        {
            let store = SqliteStore::open(&path).expect("open");
            store
                .insert(new_lead("a@x.com", Plan::Premium))
                .expect("insert");
        }

        let reopened = SqliteStore::open(&path).expect("reopen");
        let leads = reopened.list_all().expect("list");

        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].email, "a@x.com");
        assert_eq!(leads[0].name.as_deref(), Some("Ada"));
        assert_eq!(leads[0].university, University::Imperial);
        assert_eq!(leads[0].selected_plan, Plan::Premium);
        assert!(leads[0].id.is_some());
    }

    #[test]
    fn unique_constraint_surfaces_as_duplicate() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.insert(new_lead("a@x.com", Plan::Free)).expect("insert");

        let result = store.insert(new_lead("a@x.com", Plan::Premium));

        assert!(matches!(result, Err(StoreError::Duplicate { email }) if email == "a@x.com"));
        assert_eq!(store.list_all().expect("list").len(), 1);
    }

    #[test]
    fn created_at_survives_round_trip() {
        let store = SqliteStore::open_in_memory().expect("open");
        let inserted = store.insert(new_lead("c@x.com", Plan::Free)).expect("insert");
        let listed = store.list_all().expect("list");

        assert_eq!(listed[0].created_at, inserted.created_at);
    }
}
