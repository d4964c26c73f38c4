// 👥 Customers - Creation flow, filtered listing, interactions by customer

use crate::catalog::resolve_or_create_catalog_entry;
use crate::db::{CatalogKind, CustomerView, InteractionSummary, NewCustomer};
use crate::error::{RequestError, RequestResult};
use crate::normalizer::{sanitize, CatalogNormalizer};
use crate::repository::{
    CatalogRepository, CustomerField, CustomerRepository, FilterValue, InteractionRepository,
    SqliteStore,
};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{error, info};

// ============================================================================
// CREATE
// ============================================================================

/// Body of `POST /customers`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCustomer {
    pub customer_name: Option<String>,
    #[serde(alias = "customer_occupation")]
    pub occupation_name: Option<String>,
    #[serde(alias = "customer_type")]
    pub type_name: Option<String>,
}

impl CreateCustomer {
    pub fn new(customer_name: &str, occupation_name: &str, type_name: &str) -> Self {
        CreateCustomer {
            customer_name: Some(customer_name.to_string()),
            occupation_name: Some(occupation_name.to_string()),
            type_name: Some(type_name.to_string()),
        }
    }
}

/// Present and non-empty once sanitized
fn required<'a>(field: &str, value: &'a Option<String>) -> RequestResult<&'a str> {
    match value.as_deref() {
        Some(v) if !sanitize(v).is_empty() => Ok(v),
        _ => Err(RequestError::validation(format!("{field} is required"))),
    }
}

/// Resolve both catalogs, insert the customer, re-read it from the view.
///
/// Runs on whatever connection it is given; see `create_customer_atomic`
/// for the transactional wrapper the API uses.
pub fn create_customer<R>(
    repo: &R,
    normalizer: &CatalogNormalizer,
    request: &CreateCustomer,
) -> RequestResult<CustomerView>
where
    R: CatalogRepository + CustomerRepository + ?Sized,
{
    let name = required("customer_name", &request.customer_name)?;
    let occupation = required("occupation_name", &request.occupation_name)?;
    let type_label = required("type_name", &request.type_name)?;

    let id_occupation =
        resolve_or_create_catalog_entry(repo, normalizer, CatalogKind::Occupation, occupation)?;
    let id_customer_type =
        resolve_or_create_catalog_entry(repo, normalizer, CatalogKind::Type, type_label)?;

    let id_customer = repo.insert_customer(&NewCustomer {
        customer_name: sanitize(name),
        id_customer_type,
        id_occupation,
    })?;

    let mut created = repo.filter_customers(&[(
        CustomerField::IdCustomer,
        FilterValue::Integer(id_customer),
    )])?;

    match created.pop() {
        Some(customer) if created.is_empty() => {
            info!(
                id = customer.id_customer,
                occupation = %customer.occupation_name,
                customer_type = %customer.type_name,
                "customer created"
            );
            Ok(customer)
        }
        _ => Err(RequestError::Internal(format!(
            "customer {id_customer} missing from view_customers after insert"
        ))),
    }
}

/// `create_customer` inside one transaction: a failure anywhere rolls back
/// the catalog entries created along the way.
pub fn create_customer_atomic(
    conn: &mut Connection,
    normalizer: &CatalogNormalizer,
    request: &CreateCustomer,
) -> RequestResult<CustomerView> {
    let tx = conn.transaction()?;
    let customer = create_customer(&SqliteStore::new(&tx), normalizer, request)?;
    tx.commit()?;
    Ok(customer)
}

// ============================================================================
// LIST
// ============================================================================

/// Turn raw query pairs into typed filters. Unknown keys are rejected.
pub fn parse_customer_filters<'a, I>(pairs: I) -> RequestResult<Vec<(CustomerField, FilterValue)>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            let field = CustomerField::parse(key)
                .ok_or_else(|| RequestError::validation(format!("Unknown filter: {key}")))?;

            let value = if field.is_integer() {
                let parsed = value.trim().parse::<i64>().map_err(|_| {
                    RequestError::validation(format!("{key} must be an integer"))
                })?;
                FilterValue::Integer(parsed)
            } else {
                FilterValue::Text(value.to_string())
            };

            Ok((field, value))
        })
        .collect()
}

pub fn list_customers<R: CustomerRepository + ?Sized>(
    repo: &R,
    filters: &[(CustomerField, FilterValue)],
) -> RequestResult<Vec<CustomerView>> {
    if filters.is_empty() {
        Ok(repo.all_customers()?)
    } else {
        Ok(repo.filter_customers(filters)?)
    }
}

// ============================================================================
// INTERACTIONS
// ============================================================================

/// Interaction summaries for the type of one customer, or every summary
/// when no customer is given.
///
/// Zero matching customers is NotFound. More than one row for a primary key
/// means the view is broken, so it is logged and rejected.
pub fn interactions_for_customer<R>(
    repo: &R,
    customer_id: Option<i64>,
) -> RequestResult<Vec<InteractionSummary>>
where
    R: CustomerRepository + InteractionRepository + ?Sized,
{
    let Some(customer_id) = customer_id else {
        return Ok(repo.all_interaction_summaries()?);
    };

    let matches = repo.filter_customers(&[(
        CustomerField::IdCustomer,
        FilterValue::Integer(customer_id),
    )])?;

    match matches.as_slice() {
        [] => Err(RequestError::NotFound(format!("Customer {customer_id} not found"))),
        [customer] => Ok(repo.interaction_summaries_for_type(customer.id_customer_type)?),
        many => {
            error!(customer_id, rows = many.len(), "customer id resolved to several rows");
            Err(RequestError::Internal(format!(
                "customer {customer_id} resolved to {} rows",
                many.len()
            )))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
