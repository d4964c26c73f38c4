// 📂 CSV import - Bulk-load customers and interactions
//
// Customers go through the same creation flow as the API, so every row is
// normalized against the catalogs built by the rows before it.

use crate::customers::{create_customer_atomic, CreateCustomer};
use crate::db::NewInteraction;
use crate::error::RequestError;
use crate::normalizer::CatalogNormalizer;
use crate::repository::{InteractionRepository, SqliteStore};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// One CSV row: `customer_name,occupation_name,type_name`
#[derive(Debug, Deserialize)]
struct CustomerRow {
    customer_name: String,
    occupation_name: String,
    type_name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub rejected: usize,
}

pub fn import_customers(conn: &mut Connection, csv_path: &Path) -> Result<ImportReport> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    import_customers_from_reader(conn, file)
}

pub fn import_customers_from_reader<R: Read>(conn: &mut Connection, reader: R) -> Result<ImportReport> {
    let mut rdr = csv::Reader::from_reader(reader);
    let normalizer = CatalogNormalizer::new();
    let mut report = ImportReport::default();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: CustomerRow = result.context("Failed to deserialize customer row")?;
        let request = CreateCustomer::new(&row.customer_name, &row.occupation_name, &row.type_name);

        match create_customer_atomic(conn, &normalizer, &request) {
            Ok(_) => report.inserted += 1,
            Err(RequestError::Validation(reason)) => {
                // header is line 1
                warn!(line = line + 2, %reason, "customer row skipped");
                report.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

pub fn import_interactions(conn: &mut Connection, csv_path: &Path) -> Result<ImportReport> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    import_interactions_from_reader(conn, file)
}

/// Rows `customer_id,channel[,occurred_at]`, all-or-nothing
pub fn import_interactions_from_reader<R: Read>(conn: &mut Connection, reader: R) -> Result<ImportReport> {
    let mut rdr = csv::Reader::from_reader(reader);
    let tx = conn.transaction()?;
    let mut report = ImportReport::default();

    {
        let store = SqliteStore::new(&tx);
        for result in rdr.deserialize() {
            let interaction: NewInteraction = result.context("Failed to deserialize interaction row")?;
            store
                .insert_interaction(&interaction)
                .with_context(|| format!("Failed to insert interaction for customer {}", interaction.customer_id))?;
            report.inserted += 1;
        }
    }

    tx.commit()?;
    Ok(report)
}
