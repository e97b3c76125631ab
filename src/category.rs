//! Category normalization and node coloring.
//!
//! Maps the raw category labels the model emits (`[name|category]($N1)`)
//! onto a closed taxonomy, and each taxonomy entry onto a stable display
//! color. Both functions are pure and total: the same input always yields
//! the same output, and unknown labels fall back to [`Category::Uncategorized`]
//! rather than failing. The merge engine consults [`Category::is_placeholder`]
//! to decide whether an existing node's classification may be overwritten;
//! it never compares color literals.

use serde::{Deserialize, Serialize};

/// Canonical entity category.
///
/// `Uncategorized` is the sentinel assigned before any annotated category
/// is observed for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    DietarySupplement,
    Drugs,
    Disease,
    Symptom,
    Gene,
    #[default]
    Uncategorized,
}

/// Neutral tone used for uncategorized nodes.
const PLACEHOLDER_COLOR: &str = "#e5e7eb";

impl Category {
    /// Normalize a raw category label to a canonical category.
    ///
    /// Matching is case- and surrounding-whitespace-insensitive. Anything
    /// outside the taxonomy maps to the sentinel.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "dietary supplement" | "dietary supplements" | "supplement" | "supplements" => {
                Category::DietarySupplement
            }
            "drug" | "drugs" | "medication" | "medications" => Category::Drugs,
            "disease" | "diseases" | "disorder" | "condition" => Category::Disease,
            "symptom" | "symptoms" => Category::Symptom,
            "gene" | "genes" => Category::Gene,
            _ => Category::Uncategorized,
        }
    }

    /// Normalize an optional raw label; `None` yields the sentinel.
    pub fn normalize_opt(raw: Option<&str>) -> Self {
        raw.map(Category::normalize).unwrap_or_default()
    }

    /// Stable display color for this category.
    pub fn color(&self) -> &'static str {
        match self {
            Category::DietarySupplement => "#bbf7d0",
            Category::Drugs => "#fde68a",
            Category::Disease => "#fecaca",
            Category::Symptom => "#fdba74",
            Category::Gene => "#c7d2fe",
            Category::Uncategorized => PLACEHOLDER_COLOR,
        }
    }

    /// Whether this category is the uncategorized placeholder.
    ///
    /// The merge engine may overwrite a placeholder classification; a
    /// non-placeholder one never regresses back to the sentinel.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Category::Uncategorized)
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Category::DietarySupplement => "Dietary Supplement",
            Category::Drugs => "Drugs",
            Category::Disease => "Disease",
            Category::Symptom => "Symptom",
            Category::Gene => "Gene",
            Category::Uncategorized => "Uncategorized",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
