// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod subscription;

pub use subscription::{SnapshotEvent, Subscription, subscribe};

use anyhow::{Context, Result, anyhow, bail};
use rolodex_app::{ClientRecord, DocumentId};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "rolodex";
pub const CLIENTS_COLLECTION: &str = "clients-data";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
  collection TEXT NOT NULL,
  id TEXT NOT NULL,
  body TEXT NOT NULL CHECK (json_valid(body)),
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  PRIMARY KEY (collection, id)
);
";

const REQUIRED_COLUMNS: &[&str] = &["collection", "id", "body", "created_at", "updated_at"];

struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[RequiredIndex {
    name: "idx_documents_updated_at",
    create_sql: "CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents (collection, updated_at);",
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// An ordered query over one collection. Documents without the `order_by`
/// field are left out of the result, the same as the hosted store's ordered
/// queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub collection: String,
    pub order_by: String,
    pub direction: SortDirection,
}

impl DocumentQuery {
    pub fn new(
        collection: impl Into<String>,
        order_by: impl Into<String>,
        direction: SortDirection,
    ) -> Self {
        Self {
            collection: collection.into(),
            order_by: order_by.into(),
            direction,
        }
    }

    /// Newest clients first.
    pub fn clients(collection: impl Into<String>) -> Self {
        Self::new(collection, "date", SortDirection::Desc)
    }

    fn json_path(&self) -> Result<String> {
        if self.order_by.is_empty()
            || !self
                .order_by
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        {
            bail!(
                "order field {:?} must be a plain field name (letters, digits, underscore)",
                self.order_by
            );
        }
        Ok(format!("$.\"{}\"", self.order_by))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub data: Map<String, Value>,
}

impl DocumentSnapshot {
    pub fn to_client_record(&self) -> ClientRecord {
        ClientRecord::from_document(self.id.clone(), &self.data)
    }
}

pub fn client_records(documents: &[DocumentSnapshot]) -> Vec<ClientRecord> {
    documents
        .iter()
        .map(DocumentSnapshot::to_client_record)
        .collect()
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if table_exists(&self.conn, "documents")? {
            validate_schema(&self.conn)?;
        } else {
            self.conn.execute_batch(SCHEMA).context("create schema")?;
        }
        ensure_required_indexes(&self.conn)
    }

    /// Creates or fully replaces one document.
    pub fn put_document(
        &self,
        collection: &str,
        id: &DocumentId,
        data: &Map<String, Value>,
    ) -> Result<()> {
        if id.as_str().is_empty() {
            bail!("document id must not be empty");
        }
        let body = serde_json::to_string(data)
            .with_context(|| format!("encode document {collection}/{id}"))?;
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO documents (collection, id, body, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT (collection, id)
                DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
                ",
                params![collection, id.as_str(), body, now],
            )
            .with_context(|| format!("write document {collection}/{id}"))?;
        Ok(())
    }

    /// Adds a document under a fresh random id.
    pub fn add_document(&self, collection: &str, data: &Map<String, Value>) -> Result<DocumentId> {
        let id = self.generate_id()?;
        self.put_document(collection, &id, data)?;
        Ok(id)
    }

    pub fn delete_document(&self, collection: &str, id: &DocumentId) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.as_str()],
            )
            .with_context(|| format!("delete document {collection}/{id}"))?;
        Ok(removed > 0)
    }

    pub fn get_document(&self, collection: &str, id: &DocumentId) -> Result<Option<DocumentSnapshot>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load document {collection}/{id}"))?;

        body.map(|body| {
            Ok(DocumentSnapshot {
                id: id.clone(),
                data: decode_body(collection, id.as_str(), &body)?,
            })
        })
        .transpose()
    }

    pub fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentSnapshot>> {
        let path = query.json_path()?;
        let direction = query.direction.sql();
        let sql = format!(
            "
            SELECT id, body
            FROM documents
            WHERE collection = ?1
              AND json_type(body, ?2) IS NOT NULL
            ORDER BY json_extract(body, ?2) {direction}, id {direction}
            "
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("prepare documents query")?;
        let rows = stmt
            .query_map(params![query.collection, path], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .with_context(|| format!("query collection {}", query.collection))?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row.with_context(|| format!("read collection {}", query.collection))?;
            let data = decode_body(&query.collection, &id, &body)?;
            documents.push(DocumentSnapshot {
                id: DocumentId::new(id),
                data,
            });
        }
        Ok(documents)
    }

    pub fn count_documents(&self, collection: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .with_context(|| format!("count collection {collection}"))?;
        usize::try_from(count).context("document count out of range")
    }

    /// Loads a JSON array of objects into `collection`. A string `id` key
    /// becomes the document id; every other key is stored as-is.
    pub fn import_json(&self, collection: &str, path: &Path) -> Result<usize> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read import file {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse JSON import file {}", path.display()))?;
        let Value::Array(items) = value else {
            bail!(
                "import file {} must contain a JSON array of client objects",
                path.display()
            );
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin import transaction")?;
        let mut imported = 0usize;
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(mut data) = item else {
                bail!(
                    "import file {} entry {index} is not a JSON object",
                    path.display()
                );
            };
            let id = match data.remove("id") {
                Some(Value::String(id)) if !id.is_empty() => DocumentId::new(id),
                Some(Value::String(_)) | Some(Value::Null) | None => self.generate_id()?,
                Some(other) => bail!(
                    "import file {} entry {index} has non-string id {other}",
                    path.display()
                ),
            };
            self.put_document(collection, &id, &data)?;
            imported += 1;
        }
        tx.commit().context("commit import transaction")?;

        tracing::info!(collection, imported, file = %path.display(), "imported documents");
        Ok(imported)
    }

    /// Bumps whenever another connection commits to the database file.
    pub fn data_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
            .context("read data_version")
    }

    fn generate_id(&self) -> Result<DocumentId> {
        let id: String = self
            .conn
            .query_row("SELECT lower(hex(randomblob(10)))", [], |row| row.get(0))
            .context("generate document id")?;
        Ok(DocumentId::new(id))
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ROLODEX_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ROLODEX_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("rolodex.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn decode_body(collection: &str, id: &str, body: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(body)
        .with_context(|| format!("decode document {collection}/{id}"))?
    {
        Value::Object(map) => Ok(map),
        other => bail!("document {collection}/{id} is not a JSON object: {other}"),
    }
}

fn validate_schema(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "documents")?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !columns.contains(*column))
        .collect();

    if !missing.is_empty() {
        bail!(
            "table `documents` is missing required columns: {}; use a rolodex-compatible database",
            missing.join(", ")
        );
    }
    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

#[cfg(test)]
mod tests {
    use super::{DocumentQuery, SortDirection, Store};
    use anyhow::Result;

    #[test]
    fn order_field_must_be_plain_name() {
        let query = DocumentQuery::new("clients-data", "date') --", SortDirection::Desc);
        let error = query.json_path().expect_err("quoted field should fail");
        assert!(error.to_string().contains("plain field name"));

        let query = DocumentQuery::clients("clients-data");
        assert_eq!(query.json_path().ok().as_deref(), Some("$.\"date\""));
    }

    #[test]
    fn bootstrap_is_repeatable() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.bootstrap()?;
        assert_eq!(store.count_documents("clients-data")?, 0);
        Ok(())
    }

    #[test]
    fn generated_ids_are_twenty_hex_chars() -> Result<()> {
        let store = Store::open_memory()?;
        let id = store.generate_id()?;
        assert_eq!(id.as_str().len(), 20);
        assert!(id.as_str().bytes().all(|byte| byte.is_ascii_hexdigit()));
        Ok(())
    }
}
