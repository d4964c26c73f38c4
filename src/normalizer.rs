// 🔍 Catalog Normalizer - Collapse near-duplicate type/occupation labels
// Sanitize to ASCII, then first-match against the existing catalog by edit distance

use strsim::levenshtein;

// ============================================================================
// SANITIZATION
// ============================================================================

/// Strip every code point outside ASCII (0x00-0x7F) and trim the ends.
///
/// Case and internal whitespace are left untouched:
/// - sanitize("  Café Owner ") = "Caf Owner"
/// - sanitize("日本") = ""
pub fn sanitize(raw: &str) -> String {
    let ascii: String = raw.chars().filter(|c| c.is_ascii()).collect();
    ascii.trim().to_string()
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Case-insensitive Levenshtein distance between two labels
pub fn label_distance(a: &str, b: &str) -> usize {
    levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

// ============================================================================
// CATALOG NORMALIZER
// ============================================================================

pub struct CatalogNormalizer {
    /// Labels at a distance strictly below this collapse (default: 2)
    pub max_distance_exclusive: usize,
}

impl CatalogNormalizer {
    /// Create normalizer with the default threshold (identical or one edit away)
    pub fn new() -> Self {
        CatalogNormalizer {
            max_distance_exclusive: 2,
        }
    }

    /// Resolve a free-text label against the existing canonical names.
    ///
    /// Returns the FIRST existing label (in iteration order) within the
    /// threshold, not the closest one. When nothing qualifies the sanitized
    /// candidate comes back and becomes a new canonical name.
    pub fn resolve<S: AsRef<str>>(&self, candidate: &str, existing: &[S]) -> String {
        let sanitized = sanitize(candidate);

        for label in existing {
            let label: &str = label.as_ref();
            if label_distance(label, &sanitized) < self.max_distance_exclusive {
                return label.to_string();
            }
        }

        sanitized
    }
}

impl Default for CatalogNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve with the default normalizer
pub fn resolve<S: AsRef<str>>(candidate: &str, existing: &[S]) -> String {
    CatalogNormalizer::new().resolve(candidate, existing)
}

// ============================================================================
// TESTS
// ============================================================================
