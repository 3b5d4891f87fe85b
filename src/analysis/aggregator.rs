//! Transaction aggregation into per-item demand metrics.
//!
//! This module reduces the raw transaction table into one `ItemDemand` per
//! item: totals, the dataset-wide monthly average and the zero-filled weekly
//! series that both `weeks_without_demand` and the ROP estimator read.

use crate::error::InputError;
use crate::models::{DemandGroup, ItemDemand, ItemMetrics, Transaction, WeeklyDemand};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Weekday on which every weekly bucket ends.
pub const WEEK_END: Weekday = Weekday::Mon;

/// First day of the bucket containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = WEEK_END.num_days_from_monday() as i64 - date.weekday().num_days_from_monday() as i64;
    let days_to_end = offset.rem_euclid(7);
    date + Duration::days(days_to_end - 6)
}

/// Number of distinct calendar months across the whole dataset.
pub fn month_count(transactions: &[Transaction]) -> usize {
    transactions
        .iter()
        .map(|t| (t.date.year(), t.date.month()))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Bucket transactions into weekly totals, filling every gap between the
/// first and last bucket with an explicit zero week.
pub fn weekly_series<'a, I>(transactions: I) -> Vec<WeeklyDemand>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for t in transactions {
        *buckets.entry(week_start(t.date)).or_default() += t.quantity;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut week = first;
    while week <= last {
        series.push(WeeklyDemand {
            week_start: week,
            quantity: buckets.get(&week).copied().unwrap_or(0.0),
        });
        week += Duration::days(7);
    }
    series
}

/// Aggregate transactions into per-item metrics, sorted by item id.
///
/// Every item starts out as `HumanCheck`; the qualifier decides otherwise.
pub fn aggregate(transactions: &[Transaction]) -> Result<Vec<ItemDemand>, InputError> {
    let months = month_count(transactions);
    if months == 0 {
        return Err(InputError::NoMonths);
    }

    let mut by_item: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for t in transactions {
        by_item.entry(t.item_id.as_str()).or_default().push(t);
    }

    debug!("Aggregating {} items over {} months", by_item.len(), months);

    let items = by_item
        .into_iter()
        .map(|(item_id, rows)| {
            let total_quantity: f64 = rows.iter().map(|t| t.quantity).sum();
            let weekly = weekly_series(rows.iter().copied());
            let weeks_without_demand = weekly.iter().filter(|w| w.quantity == 0.0).count();

            ItemDemand {
                metrics: ItemMetrics {
                    item_id: item_id.to_string(),
                    total_quantity,
                    avg_monthly_quantity: total_quantity / months as f64,
                    transaction_count: rows.len(),
                    weeks_without_demand,
                    demand_group: DemandGroup::HumanCheck,
                },
                weekly,
            }
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(item: &str, d: NaiveDate, quantity: f64) -> Transaction {
        Transaction {
            item_id: item.to_string(),
            branch_id: "BRANCH".to_string(),
            date: d,
            quantity,
        }
    }

    #[test]
    fn test_week_start_ends_buckets_on_monday() {
        // 2024-01-01 is a Monday: it closes the bucket that began on Tuesday 2023-12-26.
        assert_eq!(week_start(date(2024, 1, 1)), date(2023, 12, 26));
        // Tuesday starts a new bucket.
        assert_eq!(week_start(date(2024, 1, 2)), date(2024, 1, 2));
        assert_eq!(week_start(date(2024, 1, 7)), date(2024, 1, 2));
        assert_eq!(week_start(date(2024, 1, 8)), date(2024, 1, 2));
        assert_eq!(week_start(date(2024, 1, 9)), date(2024, 1, 9));
    }

    #[test]
    fn test_month_count_is_dataset_wide() {
        let rows = vec![
            tx("A", date(2024, 1, 5), 1.0),
            tx("A", date(2024, 1, 20), 1.0),
            tx("B", date(2024, 3, 1), 1.0),
            tx("B", date(2025, 1, 1), 1.0),
        ];
        assert_eq!(month_count(&rows), 3);
        assert_eq!(month_count(&[]), 0);
    }

    #[test]
    fn test_weekly_series_fills_gaps() {
        let rows = vec![
            tx("A", date(2024, 1, 2), 2.0),
            tx("A", date(2024, 1, 3), 3.0),
            tx("A", date(2024, 1, 23), 4.0),
        ];
        let series = weekly_series(&rows);

        let quantities: Vec<f64> = series.iter().map(|w| w.quantity).collect();
        assert_eq!(quantities, vec![5.0, 0.0, 0.0, 4.0]);
        assert_eq!(series[0].week_start, date(2024, 1, 2));
        assert_eq!(series[3].week_start, date(2024, 1, 23));
    }

    #[test]
    fn test_aggregate_metrics() {
        let rows = vec![
            tx("B", date(2024, 1, 2), 4.0),
            tx("A", date(2024, 1, 2), 1.0),
            tx("A", date(2024, 1, 16), 2.0),
            tx("A", date(2024, 2, 13), 3.0),
        ];
        let items = aggregate(&rows).unwrap();

        assert_eq!(items.len(), 2);
        let a = &items[0].metrics;
        assert_eq!(a.item_id, "A");
        assert_eq!(a.total_quantity, 6.0);
        assert_eq!(a.transaction_count, 3);
        // Two months in the dataset.
        assert_eq!(a.avg_monthly_quantity, 3.0);
        // Buckets from 01-02 to 02-13: weeks of 01-02, 01-09(0), 01-16, 01-23(0), 01-30(0), 02-06(0), 02-13.
        assert_eq!(items[0].weekly.len(), 7);
        assert_eq!(a.weeks_without_demand, 4);
        assert_eq!(a.demand_group, DemandGroup::HumanCheck);

        let b = &items[1].metrics;
        assert_eq!(b.avg_monthly_quantity, 2.0);
        assert_eq!(b.weeks_without_demand, 0);
    }

    #[test]
    fn test_zero_quantity_transactions_count_as_empty_weeks() {
        let rows = vec![
            tx("A", date(2024, 1, 2), 0.0),
            tx("A", date(2024, 1, 9), 5.0),
        ];
        let items = aggregate(&rows).unwrap();
        assert_eq!(items[0].metrics.transaction_count, 2);
        assert_eq!(items[0].metrics.weeks_without_demand, 1);
    }

    #[test]
    fn test_empty_dataset_has_no_months() {
        assert!(matches!(aggregate(&[]), Err(InputError::NoMonths)));
    }
}
