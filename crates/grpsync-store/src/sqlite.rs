//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for grpsync. One [`SqliteStore`]
//! implements [`LocalStore`], [`MetadataStore`], and [`LockStore`] against a
//! single database file, using rusqlite with bundled SQLite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use grpsync_core::{
    ExtensionPayload, Filter, LocalId, LocalRecord, RemoteId, RemoteStoreId, SyncState, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{LocalStore, LockStore, MetadataRecord, MetadataStore, SyncScope};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex; one sync session per (user, mailbox) is
/// single-threaded, so contention is limited to the metadata actualizer.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| {
            StoreError::InvalidData(format!("connection mutex poisoned: {}", e))
        })?;
        f(&conn)
    }
}

fn state_to_str(state: SyncState) -> &'static str {
    match state {
        SyncState::New => "new",
        SyncState::Modified => "modified",
        SyncState::Deleted => "deleted",
        SyncState::Unchanged => "unchanged",
    }
}

fn state_from_str(s: &str) -> Result<SyncState> {
    match s {
        "new" => Ok(SyncState::New),
        "modified" => Ok(SyncState::Modified),
        "deleted" => Ok(SyncState::Deleted),
        "unchanged" => Ok(SyncState::Unchanged),
        other => Err(StoreError::InvalidData(format!("unknown state: {other}"))),
    }
}

fn parse_version(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad version timestamp {s}: {e}")))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String)> {
    Ok((row.get("id")?, row.get("fields")?))
}

fn decode_record(id: i64, fields: &str) -> Result<LocalRecord> {
    let mut record: LocalRecord = serde_json::from_str(fields)?;
    record.id = Some(LocalId(id));
    Ok(record)
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetadataRow> {
    Ok(MetadataRow {
        local_id: row.get("local_id")?,
        remote_id: row.get("remote_id")?,
        schema: row.get("schema")?,
        version: row.get("version")?,
        local_state: row.get("local_state")?,
        remote_state: row.get("remote_state")?,
        owner_user_id: row.get("owner_user_id")?,
        remote_store_id: row.get("remote_store_id")?,
        extra: row.get("extra")?,
        deleted: row.get("deleted")?,
    })
}

/// Raw row before typed decoding.
struct MetadataRow {
    local_id: i64,
    remote_id: String,
    schema: String,
    version: String,
    local_state: String,
    remote_state: String,
    owner_user_id: i64,
    remote_store_id: String,
    extra: String,
    deleted: bool,
}

impl MetadataRow {
    fn decode(self) -> Result<MetadataRecord> {
        Ok(MetadataRecord {
            local_id: LocalId(self.local_id),
            remote_id: self
                .remote_id
                .parse::<RemoteId>()
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            schema: self.schema,
            version: parse_version(&self.version)?,
            local_state: state_from_str(&self.local_state)?,
            remote_state: state_from_str(&self.remote_state)?,
            owner_user_id: UserId(self.owner_user_id),
            remote_store_id: RemoteStoreId(self.remote_store_id),
            extra: ExtensionPayload::decode(&self.extra)?,
            deleted: self.deleted,
        })
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn query(&self, schema: &str, filter: &Filter) -> Result<Vec<LocalRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, fields FROM records WHERE schema = ?1 AND deleted = 0")?;
            let rows = stmt
                .query_map(params![schema], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut out = Vec::new();
        for (id, fields) in rows {
            let record = decode_record(id, &fields)?;
            let matches = {
                let lookup = |name: &str| record.get(name).cloned();
                filter.matches(&lookup)
            };
            if matches {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn fetch(&self, schema: &str, id: LocalId) -> Result<Option<LocalRecord>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, fields FROM records WHERE schema = ?1 AND id = ?2",
                    params![schema, id.0],
                    row_to_record,
                )
                .optional()?;
            Ok(row)
        })?;
        row.map(|(id, fields)| decode_record(id, &fields)).transpose()
    }

    async fn insert(&self, mut record: LocalRecord) -> Result<LocalId> {
        let now = Utc::now();
        record.apply_insert_defaults(now);
        let fields = serde_json::to_string(&record)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (schema, fields, deleted, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![record.schema, fields, record.is_deleted(), now.to_rfc3339()],
            )?;
            Ok(LocalId(conn.last_insert_rowid()))
        })
    }

    async fn update(&self, record: &LocalRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| StoreError::Unsaved(record.schema.clone()))?;
        let now = Utc::now();
        let mut updated = record.clone();
        updated.set("updated_at", now);
        let fields = serde_json::to_string(&updated)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE records SET fields = ?1, deleted = ?2, updated_at = ?3
                 WHERE schema = ?4 AND id = ?5",
                params![fields, updated.is_deleted(), now.to_rfc3339(), record.schema, id.0],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    schema: record.schema.clone(),
                    id: id.0,
                });
            }
            Ok(())
        })
    }

    async fn delete(&self, schema: &str, id: LocalId) -> Result<()> {
        let Some(mut record) = self.fetch(schema, id).await? else {
            return Err(StoreError::NotFound {
                schema: schema.into(),
                id: id.0,
            });
        };
        record.set("deleted", true);
        self.update(&record).await
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn find_by_local(
        &self,
        scope: &SyncScope,
        local_id: LocalId,
    ) -> Result<Option<MetadataRecord>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM sync_metadata
                     WHERE local_id = ?1 AND schema = ?2
                       AND remote_store_id = ?3 AND owner_user_id = ?4",
                    params![local_id.0, scope.schema, scope.remote_store.0, scope.owner.0],
                    row_to_metadata,
                )
                .optional()?;
            Ok(row)
        })?;
        row.map(MetadataRow::decode).transpose()
    }

    async fn find_by_remote(
        &self,
        scope: &SyncScope,
        remote_id: &RemoteId,
    ) -> Result<Option<MetadataRecord>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM sync_metadata
                     WHERE remote_id = ?1 AND schema = ?2
                       AND remote_store_id = ?3 AND owner_user_id = ?4",
                    params![
                        remote_id.to_string(),
                        scope.schema,
                        scope.remote_store.0,
                        scope.owner.0
                    ],
                    row_to_metadata,
                )
                .optional()?;
            Ok(row)
        })?;
        row.map(MetadataRow::decode).transpose()
    }

    async fn upsert(&self, record: &MetadataRecord) -> Result<()> {
        let extra = record.extra.encode()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_metadata
                   (local_id, remote_id, schema, version, local_state, remote_state,
                    owner_user_id, remote_store_id, extra, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(local_id, schema, remote_store_id, owner_user_id)
                 DO UPDATE SET remote_id = ?2, version = ?4, local_state = ?5,
                               remote_state = ?6, extra = ?9, deleted = ?10",
                params![
                    record.local_id.0,
                    record.remote_id.to_string(),
                    record.schema,
                    record.version.to_rfc3339(),
                    state_to_str(record.local_state),
                    state_to_str(record.remote_state),
                    record.owner_user_id.0,
                    record.remote_store_id.0,
                    extra,
                    record.deleted,
                ],
            )?;
            Ok(())
        })
    }

    async fn soft_delete(&self, scope: &SyncScope, local_id: LocalId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sync_metadata SET deleted = 1, local_state = 'deleted'
                 WHERE local_id = ?1 AND schema = ?2
                   AND remote_store_id = ?3 AND owner_user_id = ?4",
                params![local_id.0, scope.schema, scope.remote_store.0, scope.owner.0],
            )?;
            Ok(())
        })
    }

    async fn list_for_scope(&self, scope: &SyncScope) -> Result<Vec<MetadataRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM sync_metadata
                 WHERE schema = ?1 AND remote_store_id = ?2
                   AND owner_user_id = ?3 AND deleted = 0",
            )?;
            let rows = stmt
                .query_map(
                    params![scope.schema, scope.remote_store.0, scope.owner.0],
                    row_to_metadata,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(MetadataRow::decode).collect()
    }

    async fn linked_local_ids(&self, scope: &SyncScope) -> Result<Vec<LocalId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT local_id FROM sync_metadata
                 WHERE schema = ?1 AND remote_store_id = ?2
                   AND owner_user_id = ?3 AND deleted = 0",
            )?;
            let ids = stmt
                .query_map(
                    params![scope.schema, scope.remote_store.0, scope.owner.0],
                    |row| row.get::<_, i64>(0),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids.into_iter().map(LocalId).collect())
        })
    }

    async fn watermark(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>> {
        let version: Option<String> = self.with_conn(|conn| {
            let v = conn
                .query_row(
                    "SELECT version FROM sync_watermarks
                     WHERE owner_user_id = ?1 AND remote_store_id = ?2 AND schema = ?3",
                    params![scope.owner.0, scope.remote_store.0, scope.schema],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(v)
        })?;
        version.as_deref().map(parse_version).transpose()
    }

    async fn commit_watermark(&self, scope: &SyncScope, version: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_watermarks (owner_user_id, remote_store_id, schema, version)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner_user_id, remote_store_id, schema)
                 DO UPDATE SET version = ?4",
                params![
                    scope.owner.0,
                    scope.remote_store.0,
                    scope.schema,
                    version.to_rfc3339()
                ],
            )?;
            Ok(())
        })
    }
}

#[async_trait]
impl LockStore for SqliteStore {
    async fn try_lock(&self, identity: &str, domain: &str, owner: &str) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO sync_locks (identity, domain, owner, locked_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![identity, domain, owner, Utc::now().to_rfc3339()],
            )?;
            let holder: String = conn.query_row(
                "SELECT owner FROM sync_locks WHERE identity = ?1 AND domain = ?2",
                params![identity, domain],
                |row| row.get(0),
            )?;
            Ok(holder == owner)
        })
    }

    async fn is_locked(&self, identity: &str, domain: &str, exclude_owner: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let holder: Option<String> = conn
                .query_row(
                    "SELECT owner FROM sync_locks WHERE identity = ?1 AND domain = ?2",
                    params![identity, domain],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(matches!(holder, Some(h) if h != exclude_owner))
        })
    }

    async fn release(&self, identity: &str, domain: &str, owner: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sync_locks WHERE identity = ?1 AND domain = ?2 AND owner = ?3",
                params![identity, domain, owner],
            )?;
            Ok(())
        })
    }

    async fn release_session(&self, owner: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sync_locks WHERE owner = ?1", params![owner])?;
            Ok(())
        })
    }
}
