//! Result assembly.
//!
//! Merges qualification, ABC classes and ROP outcomes into one record per
//! item and partitions them for export. No computation happens here.

use crate::analysis::abc::AbcAssignment;
use crate::error::EstimationError;
use crate::models::{DemandGroup, ItemMetrics, ResultSet, ReviewReason, RopResult};
use std::collections::HashMap;

/// Build the final record for one item.
///
/// `estimate` is only consulted for qualified items. A qualified item whose
/// estimate failed (or is missing) is re-flagged for human review.
pub fn assemble_one(
    metrics: &ItemMetrics,
    abc: &AbcAssignment,
    estimate: Option<&Result<u64, EstimationError>>,
) -> RopResult {
    let base = RopResult {
        item_id: metrics.item_id.clone(),
        abc_class: None,
        rop: None,
        demand_group: DemandGroup::HumanCheck,
        total_quantity: metrics.total_quantity,
        transaction_count: metrics.transaction_count,
        weeks_without_demand: metrics.weeks_without_demand,
        review_reason: None,
    };

    if metrics.demand_group == DemandGroup::HumanCheck {
        return RopResult {
            review_reason: Some(ReviewReason::InsufficientHistory),
            ..base
        };
    }

    match estimate {
        Some(Ok(rop)) => RopResult {
            abc_class: abc.resolve(metrics),
            rop: Some(*rop),
            demand_group: DemandGroup::Qualified,
            ..base
        },
        Some(Err(e)) => RopResult {
            review_reason: Some(ReviewReason::EstimationFailed(e.to_string())),
            ..base
        },
        None => RopResult {
            review_reason: Some(ReviewReason::EstimationFailed("no estimate produced".to_string())),
            ..base
        },
    }
}

/// Assemble every item and split by demand group.
///
/// Input order is preserved inside each group.
pub fn assemble(
    items: &[ItemMetrics],
    abc: &AbcAssignment,
    estimates: &HashMap<String, Result<u64, EstimationError>>,
) -> ResultSet {
    let mut set = ResultSet::default();

    for metrics in items {
        let result = assemble_one(metrics, abc, estimates.get(&metrics.item_id));
        match result.demand_group {
            DemandGroup::Qualified => set.results.push(result),
            DemandGroup::HumanCheck => set.needs_review.push(result),
        }
    }

    set
}
