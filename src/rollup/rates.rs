use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A derived ratio between two accumulated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSpec {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    /// Multiplier applied to the ratio (100 for percentages).
    #[serde(default = "default_scale")]
    pub scale: f64,
}

const fn default_scale() -> f64 {
    1.0
}

impl RateSpec {
    pub fn new(name: &str, numerator: &str, denominator: &str, scale: f64) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            scale,
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0 or the result
/// is not finite.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Evaluate each rate against accumulated metrics. Absent metrics read as 0.
pub fn derive_rates(metrics: &BTreeMap<String, f64>, specs: &[RateSpec]) -> BTreeMap<String, f64> {
    specs
        .iter()
        .map(|spec| {
            let numerator = metrics.get(&spec.numerator).copied().unwrap_or(0.0);
            let denominator = metrics.get(&spec.denominator).copied().unwrap_or(0.0);
            let value = safe_ratio(numerator, denominator) * spec.scale;
            (spec.name.clone(), if value.is_finite() { value } else { 0.0 })
        })
        .collect()
}

/// CTR, conversion rate, CPC and CPA over the canonical ad metric names.
pub fn ad_rates() -> Vec<RateSpec> {
    vec![
        RateSpec::new("ctr", "clicks", "impressions", 100.0),
        RateSpec::new("conv_rate", "conversions", "clicks", 100.0),
        RateSpec::new("cpc", "cost", "clicks", 1.0),
        RateSpec::new("cpa", "cost", "conversions", 1.0),
    ]
}

/// Rates that only need clicks and impressions (organic search).
pub fn search_rates() -> Vec<RateSpec> {
    vec![RateSpec::new("ctr", "clicks", "impressions", 100.0)]
}
