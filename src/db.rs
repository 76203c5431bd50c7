use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, info};

use crate::contact::{default_headers, Contact, Header};

/// Highest `user_version` this build knows how to read.
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database schema version {found} is newer than the supported version {supported}")]
    Unsupported { found: i64, supported: i64 },
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the contacts database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database dir: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        info!(path = %path.display(), "opened database");

        let mut db = Self { conn };
        db.setup()
            .with_context(|| format!("failed to initialize database at {}", path.display()))?;
        Ok(db)
    }

    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    fn setup(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS people (
              id        INTEGER PRIMARY KEY,
              firstname TEXT,
              lastname  TEXT,
              comment   TEXT
            );
        "#,
        )?;
        self.migrate()
    }

    fn migrate(&mut self) -> Result<()> {
        let version = self.schema_version()?;
        if version > SCHEMA_VERSION {
            return Err(SchemaError::Unsupported {
                found: version,
                supported: SCHEMA_VERSION,
            }
            .into());
        }
        if version == SCHEMA_VERSION {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // 0 -> 1: comment column. Fresh tables already have it.
        if !column_exists(&tx, "people", "comment")? {
            tx.execute_batch("ALTER TABLE people ADD COLUMN comment TEXT;")?;
            info!("added people.comment column");
        }
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tx.commit()?;

        info!(from = version, to = SCHEMA_VERSION, "migrated schema");
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        let version = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    #[allow(dead_code)]
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        column_exists(&self.conn, table, column)
    }

    /// All contacts in id order, plus the fixed column headers.
    pub fn list(&self) -> Result<(Vec<Header>, Vec<Contact>)> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, firstname, lastname, comment FROM people ORDER BY id")
            .context("failed to prepare contact listing")?;
        let rows = stmt.query_map([], row_to_contact)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        debug!(count = out.len(), "listed contacts");
        Ok((default_headers(), out))
    }

    pub fn get(&self, id: i64) -> Result<Option<Contact>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, firstname, lastname, comment FROM people WHERE id = ?1")?;
        let mut rows = stmt.query_map([id], row_to_contact)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Insert or update depending on whether the contact already has an id.
    /// Returns the id of the stored row.
    pub fn save(&mut self, contact: &Contact) -> Result<i64> {
        if contact.is_persisted() {
            self.update(contact)
        } else {
            self.insert(contact)
        }
    }

    fn update(&mut self, contact: &Contact) -> Result<i64> {
        debug!(
            id = contact.id,
            first = %contact.first_name,
            last = %contact.last_name,
            "updating contact"
        );
        let mut stmt = self
            .conn
            .prepare("UPDATE people SET firstname = ?1, lastname = ?2, comment = ?3 WHERE id = ?4")
            .context("failed to prepare contact update")?;
        stmt.execute(params![
            contact.first_name,
            contact.last_name,
            contact.comment,
            contact.id
        ])
        .with_context(|| format!("failed to update contact {}", contact.id))?;
        Ok(contact.id)
    }

    fn insert(&mut self, contact: &Contact) -> Result<i64> {
        debug!(
            first = %contact.first_name,
            last = %contact.last_name,
            "adding contact"
        );
        let mut stmt = self
            .conn
            .prepare("INSERT INTO people (firstname, lastname, comment) VALUES (?1, ?2, ?3)")
            .context("failed to prepare contact insert")?;
        let id = stmt
            .insert(params![contact.first_name, contact.last_name, contact.comment])
            .context("failed to insert contact")?;
        info!(id, "added contact");
        Ok(id)
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row: &Row| -> rusqlite::Result<String> { row.get(1) })?;
    for r in rows {
        if r? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn row_to_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
    // Rows written before the comment column existed hold NULLs.
    Ok(Contact {
        id: row.get(0)?,
        first_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        last_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        comment: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn legacy_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, firstname TEXT, lastname TEXT);
             INSERT INTO people (firstname, lastname) VALUES ('Ann', 'Lee');",
        )
        .unwrap();
    }

    #[test]
    fn test_fresh_database_is_current() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
        assert!(db.column_exists("people", "comment").unwrap());
        let (headers, contacts) = db.list().unwrap();
        assert_eq!(headers.len(), 4);
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_insert_assigns_ids_in_order() {
        let mut db = Database::open_in_memory().unwrap();
        let first = db.save(&Contact::new("Ann", "Lee", "x")).unwrap();
        let second = db.save(&Contact::new("Bo", "Kim", "y")).unwrap();
        assert!(first > 0);
        assert!(second > first);

        let (_, contacts) = db.list().unwrap();
        assert_eq!(
            contacts,
            vec![
                Contact::new("Ann", "Lee", "x").with_id(first),
                Contact::new("Bo", "Kim", "y").with_id(second),
            ]
        );
    }

    #[test]
    fn test_update_keeps_id_and_changes_text() {
        let mut db = Database::open_in_memory().unwrap();
        let id = db.save(&Contact::new("Ann", "Lee", "x")).unwrap();
        let other = db.save(&Contact::new("Bo", "Kim", "y")).unwrap();

        let edited = Contact::new("Anne", "Leigh", "").with_id(id);
        assert_eq!(db.save(&edited).unwrap(), id);

        assert_eq!(db.get(id).unwrap(), Some(edited));
        assert_eq!(
            db.get(other).unwrap(),
            Some(Contact::new("Bo", "Kim", "y").with_id(other))
        );
        assert_eq!(db.list().unwrap().1.len(), 2);
    }

    #[test]
    fn test_empty_fields_are_stored_as_is() {
        let mut db = Database::open_in_memory().unwrap();
        let id = db.save(&Contact::new("", "", "")).unwrap();
        assert_eq!(db.get(id).unwrap(), Some(Contact::new("", "", "").with_id(id)));
    }

    #[test]
    fn test_migrates_pre_comment_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.db");
        legacy_db(&path);

        let db = Database::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
        assert!(db.column_exists("people", "comment").unwrap());

        let (_, contacts) = db.list().unwrap();
        assert_eq!(contacts, vec![Contact::new("Ann", "Lee", "").with_id(1)]);
    }

    #[test]
    fn test_reopen_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.db");
        legacy_db(&path);

        {
            let mut db = Database::open(&path).unwrap();
            db.save(&Contact::new("Bo", "Kim", "y")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
        assert_eq!(db.list().unwrap().1.len(), 2);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 7).unwrap();
        }

        let err = Database::open(&path).err().expect("open must fail");
        let schema = err.downcast_ref::<SchemaError>();
        assert!(
            matches!(schema, Some(SchemaError::Unsupported { found: 7, supported: 1 })),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("contacts.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }
}
