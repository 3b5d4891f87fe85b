//! Demand qualification.

use crate::config::PolicyConfig;
use crate::models::{DemandGroup, ItemDemand, ItemMetrics};

/// Thresholds an item must meet for automated estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualificationRules {
    pub min_avg_monthly_quantity: f64,
    pub min_transaction_count: usize,
}

impl Default for QualificationRules {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for QualificationRules {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            min_avg_monthly_quantity: policy.min_avg_monthly_quantity,
            min_transaction_count: policy.min_transaction_count,
        }
    }
}

impl QualificationRules {
    /// Both thresholds are inclusive.
    pub fn classify(&self, metrics: &ItemMetrics) -> DemandGroup {
        if metrics.avg_monthly_quantity >= self.min_avg_monthly_quantity
            && metrics.transaction_count >= self.min_transaction_count
        {
            DemandGroup::Qualified
        } else {
            DemandGroup::HumanCheck
        }
    }

    /// Classify every item in place and return how many qualified.
    pub fn apply(&self, items: &mut [ItemDemand]) -> usize {
        let mut qualified = 0;
        for item in items.iter_mut() {
            item.metrics.demand_group = self.classify(&item.metrics);
            if item.metrics.demand_group == DemandGroup::Qualified {
                qualified += 1;
            }
        }
        qualified
    }
}
