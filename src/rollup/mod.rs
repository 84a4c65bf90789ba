//! Time bucketing, derived rates, and cross-source reconciliation.

pub mod breakdown;
pub mod bucket;
pub mod calendar;
pub mod rates;
pub mod reconcile;
pub mod summary;
pub mod yoy;
