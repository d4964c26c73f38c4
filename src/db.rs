use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// RECORDS
// ============================================================================

/// Which catalog a label belongs to. The two catalogs are independent namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogKind {
    Type,
    Occupation,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Type => "type",
            CatalogKind::Occupation => "occupation",
        }
    }

    /// (table, id column, name column)
    pub(crate) fn columns(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            CatalogKind::Type => ("customer_types", "id_customer_type", "type_name"),
            CatalogKind::Occupation => ("occupations", "id_occupation", "occupation_name"),
        }
    }
}

/// Persisted canonical label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub canonical_name: String,
}

/// Row of `view_customers`: a customer joined with both catalog names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerView {
    pub id_customer: i64,
    pub occupation_name: String,
    pub customer_name: String,
    pub id_customer_type: i64,
    pub type_name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New customer row, both catalog ids already resolved
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub customer_name: String,
    pub id_customer_type: i64,
    pub id_occupation: i64,
}

/// Row of `view_interactions`: channel usage of every customer of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSummary {
    pub id_customer_type: i64,
    pub channel_counts: BTreeMap<String, i64>,
}

/// Raw interaction (one contact through one channel)
#[derive(Debug, Clone, Deserialize)]
pub struct NewInteraction {
    pub customer_id: i64,
    pub channel: String,
    #[serde(default)]
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id_user: i64,
    pub username: String,
    pub password_hash: String,
    /// Raw JSON permission map, parsed by `permissions::PermissionSet`
    pub permissions: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open_database(path: &str) -> Result<Connection> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(Path::new(path))
            .with_context(|| format!("Failed to open database at {}", path))?
    };

    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases silently keep "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Catalogs (canonical names unique per catalog)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customer_types (
            id_customer_type INTEGER PRIMARY KEY AUTOINCREMENT,
            type_name TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS occupations (
            id_occupation INTEGER PRIMARY KEY AUTOINCREMENT,
            occupation_name TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Customers + Interactions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            id_customer INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_name TEXT NOT NULL,
            id_customer_type INTEGER NOT NULL REFERENCES customer_types(id_customer_type),
            id_occupation INTEGER NOT NULL REFERENCES occupations(id_occupation),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS interactions (
            id_interaction INTEGER PRIMARY KEY AUTOINCREMENT,
            id_customer INTEGER NOT NULL REFERENCES customers(id_customer),
            channel TEXT NOT NULL,
            occurred_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Users + Sessions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id_user INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            permissions TEXT NOT NULL DEFAULT '{}'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Read models
    // ==========================================================================
    conn.execute(
        "CREATE VIEW IF NOT EXISTS view_customers AS
         SELECT c.id_customer,
                o.occupation_name,
                c.customer_name,
                c.id_customer_type,
                t.type_name,
                c.created_at,
                c.updated_at
         FROM customers c
         JOIN customer_types t ON t.id_customer_type = c.id_customer_type
         JOIN occupations o ON o.id_occupation = c.id_occupation",
        [],
    )?;

    conn.execute(
        "CREATE VIEW IF NOT EXISTS view_interactions AS
         SELECT id_customer_type, json_group_object(channel, n) AS channel_counts
         FROM (
             SELECT c.id_customer_type, i.channel, COUNT(*) AS n
             FROM interactions i
             JOIN customers c ON c.id_customer = i.id_customer
             GROUP BY c.id_customer_type, i.channel
         )
         GROUP BY id_customer_type",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_interactions_customer ON interactions(id_customer)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at)",
        [],
    )?;

    Ok(())
}
