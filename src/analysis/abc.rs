//! ABC ranking of qualified items by volume.
//!
//! Only the top-N qualified items by total quantity are ranked. Items outside
//! that working set are absent from the resulting map and resolve to
//! `AbcClass::FALLBACK` when looked up; unqualified items never get a class.

use crate::config::PolicyConfig;
use crate::models::{AbcClass, DemandGroup, ItemMetrics};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Cumulative-share thresholds and working-set size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbcPolicy {
    pub top_n: usize,
    pub a_share: f64,
    pub b_share: f64,
}

impl Default for AbcPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for AbcPolicy {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            top_n: policy.abc_top_n,
            a_share: policy.abc_a_share,
            b_share: policy.abc_b_share,
        }
    }
}

/// One ranked item.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    pub item_id: String,
    pub total_quantity: f64,
    /// Running total up to and including this item.
    pub cumulative_quantity: f64,
    pub class: AbcClass,
}

/// ABC classes of the ranked working set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbcAssignment {
    /// Ranked items, highest volume first.
    pub ranked: Vec<RankedItem>,
    classes: HashMap<String, AbcClass>,
}

impl AbcAssignment {
    /// Class of a ranked item, `None` if it is outside the working set.
    pub fn get(&self, item_id: &str) -> Option<AbcClass> {
        self.classes.get(item_id).copied()
    }

    /// Class of a qualified item, with the documented fallback for items
    /// that were qualified but not ranked.
    pub fn class_for_qualified(&self, item_id: &str) -> AbcClass {
        self.get(item_id).unwrap_or(AbcClass::FALLBACK)
    }

    /// Class label for any item: `None` for unqualified items.
    pub fn resolve(&self, metrics: &ItemMetrics) -> Option<AbcClass> {
        match metrics.demand_group {
            DemandGroup::Qualified => Some(self.class_for_qualified(&metrics.item_id)),
            DemandGroup::HumanCheck => None,
        }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Volume descending, then item id ascending.
fn by_volume(a: &ItemMetrics, b: &ItemMetrics) -> Ordering {
    b.total_quantity
        .partial_cmp(&a.total_quantity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Rank the qualified items among `items` and assign A/B/C.
///
/// Non-qualified metrics rows are ignored.
pub fn rank<'a, I>(items: I, policy: &AbcPolicy) -> AbcAssignment
where
    I: IntoIterator<Item = &'a ItemMetrics>,
{
    let mut selected: Vec<&ItemMetrics> = items
        .into_iter()
        .filter(|m| m.demand_group == DemandGroup::Qualified)
        .collect();
    selected.sort_by(|a, b| by_volume(a, b));
    selected.truncate(policy.top_n);

    let total: f64 = selected.iter().map(|m| m.total_quantity).sum();
    let a_limit = policy.a_share * total;
    let b_limit = policy.b_share * total;

    let mut cumulative = 0.0;
    let ranked: Vec<RankedItem> = selected
        .into_iter()
        .map(|m| {
            cumulative += m.total_quantity;
            let class = if cumulative <= a_limit {
                AbcClass::A
            } else if cumulative <= b_limit {
                AbcClass::B
            } else {
                AbcClass::C
            };
            RankedItem {
                item_id: m.item_id.clone(),
                total_quantity: m.total_quantity,
                cumulative_quantity: cumulative,
                class,
            }
        })
        .collect();

    let classes = ranked
        .iter()
        .map(|r| (r.item_id.clone(), r.class))
        .collect();

    AbcAssignment { ranked, classes }
}
