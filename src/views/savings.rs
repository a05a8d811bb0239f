//! Storage savings aggregation

use crate::models::StorageRecommendation;

/// Sum of potential savings across downsize and delete recommendations
pub fn potential_savings<'a>(recs: impl IntoIterator<Item = &'a StorageRecommendation>) -> f64 {
    recs.into_iter()
        .filter(|r| r.recommendation_type.is_actionable_saving())
        .map(|r| r.potential_savings)
        .filter(|s| s.is_finite())
        .sum()
}
