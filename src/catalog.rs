// 🏷️ Catalog resolution - Normalize a label, then get-or-create its entry
//
// Type and occupation catalogs are resolved independently; the normalizer
// never sees both at once.

use crate::db::CatalogKind;
use crate::normalizer::CatalogNormalizer;
use crate::repository::CatalogRepository;
use rusqlite::Result;
use tracing::{debug, info};

/// Map a free-text label to a catalog entry id, creating the entry when the
/// label is genuinely new.
///
/// 1. fetch every canonical name of `kind`
/// 2. resolve the label against them (first match within one edit)
/// 3. exact lookup of the resolved name
/// 4. insert when missing
pub fn resolve_or_create_catalog_entry<R: CatalogRepository + ?Sized>(
    repo: &R,
    normalizer: &CatalogNormalizer,
    kind: CatalogKind,
    label: &str,
) -> Result<i64> {
    let names = repo.catalog_names(kind)?;
    let resolved = normalizer.resolve(label, names.as_slice());

    if resolved != label {
        debug!(catalog = kind.as_str(), label, resolved = %resolved, "label normalized");
    }

    if let Some(entry) = repo.find_catalog_entry(kind, &resolved)? {
        return Ok(entry.id);
    }

    let entry = repo.insert_catalog_entry(kind, &resolved)?;
    info!(catalog = kind.as_str(), id = entry.id, name = %entry.canonical_name, "catalog entry created");

    Ok(entry.id)
}
