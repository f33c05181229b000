use crate::sqlite_column;
use crate::sqlite_persistence::{
    read_schema_version, Column, SqlType, Table, VersionedSchema,
};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::password::PasswordDigest;
use super::user_store::{NewUser, UserStore};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// V 0
const USERS_TABLE_V_0: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!(
            "username",
            &SqlType::Text,
            is_primary_key = true,
            is_unique = true,
            non_null = true
        ),
        sqlite_column!("password_hash", &SqlType::Text, non_null = true),
        sqlite_column!("email", &SqlType::Text, non_null = true),
        sqlite_column!("favorite_animal", &SqlType::Text, non_null = true),
    ],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[USERS_TABLE_V_0],
}];

/// SQLite-backed [`UserStore`]. Every call opens its own connection, so the store can
/// be shared freely between connection tasks.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    db_path: PathBuf,
    digest: PasswordDigest,
}

impl SqliteUserStore {
    /// Opens the database at `db_path`, creating the schema if the file does not exist
    /// and validating it otherwise.
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let latest = VERSIONED_SCHEMAS
            .last()
            .context("No user schema defined")?;

        if !db_path.exists() {
            let conn = Connection::open(&db_path)
                .with_context(|| format!("Failed to create user db {}", db_path.display()))?;
            latest.create(&conn)?;
            info!("Created user db at {}", db_path.display());
        } else {
            let conn = Connection::open(&db_path)
                .with_context(|| format!("Failed to open user db {}", db_path.display()))?;
            let version = read_schema_version(&conn)?;
            let schema = match VERSIONED_SCHEMAS.get(version) {
                Some(schema) => schema,
                None => bail!("Database version {} is too new", version),
            };
            schema.validate(&conn)?;
            if schema.version != latest.version {
                bail!(
                    "Database version {} is outdated, expected {}",
                    schema.version,
                    latest.version
                );
            }
            debug!("Opened user db at {} (version {})", db_path.display(), version);
        }

        Ok(SqliteUserStore {
            db_path,
            digest: PasswordDigest::default(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open user db {}", self.db_path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl UserStore for SqliteUserStore {
    fn insert_user(&self, user: &NewUser<'_>) -> Result<bool> {
        let conn = self.open()?;
        let result = conn.execute(
            &format!(
                "INSERT INTO {} (username, password_hash, email, favorite_animal) VALUES (?1, ?2, ?3, ?4)",
                USERS_TABLE_V_0.name
            ),
            params![
                user.username,
                self.digest.hash(user.password),
                user.email,
                user.favorite_animal
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to insert user {}", user.username))
            }
        }
    }

    fn validate_user(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.open()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE username = ?1 AND password_hash = ?2",
                    USERS_TABLE_V_0.name
                ),
                params![username, self.digest.hash(password)],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("Failed to look up user {}", username))?;
        Ok(found.is_some())
    }
}
