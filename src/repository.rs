// 🗄️ Repositories - One interface per record kind over an explicit connection
//
// `SqliteStore` borrows a `Connection` (or a `rusqlite::Transaction`, which
// derefs to one), so callers decide the transaction boundary.

use crate::db::{
    CatalogEntry, CatalogKind, CustomerView, InteractionSummary, NewCustomer, NewInteraction,
    UserRecord,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result, Row};
use std::collections::BTreeMap;

// ============================================================================
// FILTERS
// ============================================================================

/// Columns of `view_customers` that can be filtered by exact value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerField {
    IdCustomer,
    CustomerName,
    OccupationName,
    IdCustomerType,
    TypeName,
    CreatedAt,
    UpdatedAt,
}

impl CustomerField {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id_customer" => Some(CustomerField::IdCustomer),
            "customer_name" => Some(CustomerField::CustomerName),
            "occupation_name" => Some(CustomerField::OccupationName),
            "id_customer_type" => Some(CustomerField::IdCustomerType),
            "type_name" => Some(CustomerField::TypeName),
            "created_at" => Some(CustomerField::CreatedAt),
            "updated_at" => Some(CustomerField::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            CustomerField::IdCustomer => "id_customer",
            CustomerField::CustomerName => "customer_name",
            CustomerField::OccupationName => "occupation_name",
            CustomerField::IdCustomerType => "id_customer_type",
            CustomerField::TypeName => "type_name",
            CustomerField::CreatedAt => "created_at",
            CustomerField::UpdatedAt => "updated_at",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CustomerField::IdCustomer | CustomerField::IdCustomerType)
    }
}

/// Exact-match filter value, typed to the column
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
}

impl From<FilterValue> for Value {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::Integer(i) => Value::Integer(i),
            FilterValue::Text(s) => Value::Text(s),
        }
    }
}

// ============================================================================
// INTERFACES
// ============================================================================

pub trait CatalogRepository {
    /// All canonical names of one catalog, oldest first
    fn catalog_names(&self, kind: CatalogKind) -> Result<Vec<String>>;

    fn find_catalog_entry(&self, kind: CatalogKind, name: &str) -> Result<Option<CatalogEntry>>;

    /// Insert a canonical name; an existing identical name is reused
    fn insert_catalog_entry(&self, kind: CatalogKind, name: &str) -> Result<CatalogEntry>;
}

pub trait CustomerRepository {
    fn insert_customer(&self, customer: &NewCustomer) -> Result<i64>;

    fn all_customers(&self) -> Result<Vec<CustomerView>>;

    fn filter_customers(&self, filters: &[(CustomerField, FilterValue)]) -> Result<Vec<CustomerView>>;
}

pub trait InteractionRepository {
    fn insert_interaction(&self, interaction: &NewInteraction) -> Result<i64>;

    fn all_interaction_summaries(&self) -> Result<Vec<InteractionSummary>>;

    fn interaction_summaries_for_type(&self, id_customer_type: i64) -> Result<Vec<InteractionSummary>>;
}

pub trait UserRepository {
    fn find_user(&self, username: &str) -> Result<Option<UserRecord>>;

    fn insert_user(&self, username: &str, password_hash: &str, permissions: &str) -> Result<i64>;
}

pub trait SessionRepository {
    fn insert_session(
        &self,
        token_hash: &str,
        username: &str,
        issued_at: &str,
        expires_at: &str,
    ) -> Result<()>;

    /// (username, expires_at) for a stored token hash
    fn find_session(&self, token_hash: &str) -> Result<Option<(String, String)>>;

    fn delete_sessions_expired_before(&self, cutoff: &str) -> Result<usize>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }
}

const CUSTOMER_COLUMNS: &str = "id_customer, occupation_name, customer_name, id_customer_type,
     type_name, created_at, updated_at";

fn customer_from_row(row: &Row<'_>) -> Result<CustomerView> {
    Ok(CustomerView {
        id_customer: row.get(0)?,
        occupation_name: row.get(1)?,
        customer_name: row.get(2)?,
        id_customer_type: row.get(3)?,
        type_name: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> Result<InteractionSummary> {
    let counts_json: String = row.get(1)?;
    let channel_counts: BTreeMap<String, i64> = serde_json::from_str(&counts_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(InteractionSummary {
        id_customer_type: row.get(0)?,
        channel_counts,
    })
}

impl CatalogRepository for SqliteStore<'_> {
    fn catalog_names(&self, kind: CatalogKind) -> Result<Vec<String>> {
        let (table, id_col, name_col) = kind.columns();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {name_col} FROM {table} ORDER BY {id_col}"))?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;

        Ok(names)
    }

    fn find_catalog_entry(&self, kind: CatalogKind, name: &str) -> Result<Option<CatalogEntry>> {
        let (table, id_col, name_col) = kind.columns();

        self.conn
            .query_row(
                &format!("SELECT {id_col}, {name_col} FROM {table} WHERE {name_col} = ?1"),
                [name],
                |row| {
                    Ok(CatalogEntry {
                        id: row.get(0)?,
                        canonical_name: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    fn insert_catalog_entry(&self, kind: CatalogKind, name: &str) -> Result<CatalogEntry> {
        let (table, _, name_col) = kind.columns();

        self.conn.execute(
            &format!("INSERT INTO {table} ({name_col}) VALUES (?1) ON CONFLICT({name_col}) DO NOTHING"),
            [name],
        )?;

        self.find_catalog_entry(kind, name)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }
}

impl CustomerRepository for SqliteStore<'_> {
    fn insert_customer(&self, customer: &NewCustomer) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO customers (customer_name, id_customer_type, id_occupation)
             VALUES (?1, ?2, ?3)",
            params![
                customer.customer_name,
                customer.id_customer_type,
                customer.id_occupation,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn all_customers(&self) -> Result<Vec<CustomerView>> {
        self.filter_customers(&[])
    }

    fn filter_customers(&self, filters: &[(CustomerField, FilterValue)]) -> Result<Vec<CustomerView>> {
        let mut sql = format!("SELECT {CUSTOMER_COLUMNS} FROM view_customers");

        if !filters.is_empty() {
            let clauses: Vec<String> = filters
                .iter()
                .enumerate()
                .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id_customer");

        let values: Vec<Value> = filters.iter().map(|(_, v)| v.clone().into()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let customers = stmt
            .query_map(params_from_iter(values), customer_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(customers)
    }
}

impl InteractionRepository for SqliteStore<'_> {
    fn insert_interaction(&self, interaction: &NewInteraction) -> Result<i64> {
        match &interaction.occurred_at {
            Some(at) => self.conn.execute(
                "INSERT INTO interactions (id_customer, channel, occurred_at) VALUES (?1, ?2, ?3)",
                params![interaction.customer_id, interaction.channel, at],
            )?,
            None => self.conn.execute(
                "INSERT INTO interactions (id_customer, channel) VALUES (?1, ?2)",
                params![interaction.customer_id, interaction.channel],
            )?,
        };

        Ok(self.conn.last_insert_rowid())
    }

    fn all_interaction_summaries(&self) -> Result<Vec<InteractionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id_customer_type, channel_counts FROM view_interactions
             ORDER BY id_customer_type",
        )?;

        let summaries = stmt
            .query_map([], summary_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(summaries)
    }

    fn interaction_summaries_for_type(&self, id_customer_type: i64) -> Result<Vec<InteractionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id_customer_type, channel_counts FROM view_interactions
             WHERE id_customer_type = ?1",
        )?;

        let summaries = stmt
            .query_map([id_customer_type], summary_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(summaries)
    }
}

impl UserRepository for SqliteStore<'_> {
    fn find_user(&self, username: &str) -> Result<Option<UserRecord>> {
        self.conn
            .query_row(
                "SELECT id_user, username, password_hash, permissions FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(UserRecord {
                        id_user: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        permissions: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    fn insert_user(&self, username: &str, password_hash: &str, permissions: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (username, password_hash, permissions) VALUES (?1, ?2, ?3)",
            params![username, password_hash, permissions],
        )?;

        Ok(self.conn.last_insert_rowid())
    }
}

impl SessionRepository for SqliteStore<'_> {
    fn insert_session(
        &self,
        token_hash: &str,
        username: &str,
        issued_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (token_hash, username, issued_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token_hash, username, issued_at, expires_at],
        )?;

        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> Result<Option<(String, String)>> {
        self.conn
            .query_row(
                "SELECT username, expires_at FROM sessions WHERE token_hash = ?1",
                [token_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
    }

    fn delete_sessions_expired_before(&self, cutoff: &str) -> Result<usize> {
        self.conn
            .execute("DELETE FROM sessions WHERE expires_at < ?1", [cutoff])
    }
}

// ============================================================================
// TESTS
// ============================================================================
