//! Aggregation stage: counts and percentage tables over the Finding set.

mod aggregate;
mod run;
mod tables;
#[cfg(test)]
mod tests;

pub use aggregate::{
    GroupKey, aggregate_by_category, group_counts, impact_area_matrix, language_strength_matrix,
    percentage, summarize, target_disclosure_channel, target_quantification, yearly_trend,
};
pub use run::run;
pub use tables::write_tables;
