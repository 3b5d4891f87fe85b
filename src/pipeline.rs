//! Batch pipeline from transactions to partitioned ROP results.
//!
//! `compute` is the sequential reference: aggregation, qualification, ABC
//! ranking, one bootstrap per qualified item, then assembly. `run` produces
//! the same results with estimation spread over blocking worker threads.
//! Every item draws from its own seeded stream, so both paths are
//! bit-identical for a given batch seed.

use crate::analysis::{
    aggregate, assemble, estimate_rop, item_rng, rank, AbcAssignment, AbcPolicy, EstimatorParams,
    QualificationRules,
};
use crate::config::{PolicyConfig, ServiceLevels};
use crate::error::{EstimationError, InputError, PipelineError};
use crate::models::{DemandGroup, ItemDemand, ItemMetrics, ResultSet, Transaction};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregated, qualified and ranked items, ready for estimation.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// One entry per item, sorted by item id.
    pub items: Vec<ItemDemand>,
    pub abc: AbcAssignment,
    pub qualified: usize,
}

impl PreparedBatch {
    pub fn metrics(&self) -> Vec<ItemMetrics> {
        self.items.iter().map(|i| i.metrics.clone()).collect()
    }
}

/// Run every stage up to (not including) ROP estimation.
pub fn prepare(transactions: &[Transaction], policy: &PolicyConfig) -> Result<PreparedBatch, InputError> {
    let mut items = aggregate(transactions)?;
    let qualified = QualificationRules::from(policy).apply(&mut items);
    let abc = rank(items.iter().map(|i| &i.metrics), &AbcPolicy::from(policy));

    info!(
        "{} items: {} qualified, {} need review, {} ranked for ABC",
        items.len(),
        qualified,
        items.len() - qualified,
        abc.len()
    );

    Ok(PreparedBatch {
        items,
        abc,
        qualified,
    })
}

/// Everything one item's estimation needs, owned so it can move to a worker.
#[derive(Debug, Clone)]
struct EstimationJob {
    item_id: String,
    weekly: Vec<f64>,
    service_level: f64,
    params: EstimatorParams,
    batch_seed: u64,
}

impl EstimationJob {
    fn run(self) -> (String, Result<u64, EstimationError>) {
        let mut rng = item_rng(self.batch_seed, &self.item_id);
        let outcome = estimate_rop(
            &self.item_id,
            &self.weekly,
            self.service_level,
            &self.params,
            &mut rng,
        );

        match &outcome {
            Ok(estimate) => debug!(
                "{}: raw {:.3}, mode {:?}, floor {} -> ROP {}",
                self.item_id,
                estimate.raw_estimate,
                estimate.nonzero_mode,
                estimate.floor_applied,
                estimate.rop
            ),
            Err(e) => warn!("{}", e),
        }

        (self.item_id, outcome.map(|e| e.rop))
    }
}

fn estimation_jobs(
    batch: &PreparedBatch,
    policy: &PolicyConfig,
    service_levels: &ServiceLevels,
    batch_seed: u64,
) -> Vec<EstimationJob> {
    let params = EstimatorParams::from(policy);

    batch
        .items
        .iter()
        .filter(|i| i.metrics.demand_group == DemandGroup::Qualified)
        .map(|i| {
            let class = batch.abc.class_for_qualified(&i.metrics.item_id);
            if let (Some(first), Some(last)) = (i.weekly.first(), i.weekly.last()) {
                debug!(
                    "{}: class {}, {} weeks from {} to {}",
                    i.metrics.item_id,
                    class,
                    i.weekly.len(),
                    first.week_start,
                    last.week_start
                );
            }
            EstimationJob {
                item_id: i.metrics.item_id.clone(),
                weekly: i.weekly_quantities(),
                service_level: service_levels.for_class(class),
                params,
                batch_seed,
            }
        })
        .collect()
}

/// Options for the concurrent driver.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_seed: u64,
    /// Maximum items estimated at once.
    pub concurrency: usize,
    pub cancel: CancelFlag,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn new(batch_seed: u64) -> Self {
        Self {
            batch_seed,
            concurrency: 1,
            cancel: CancelFlag::new(),
            show_progress: false,
        }
    }
}

/// Sequential reference run.
pub fn compute(
    transactions: &[Transaction],
    policy: &PolicyConfig,
    service_levels: &ServiceLevels,
    batch_seed: u64,
    cancel: &CancelFlag,
) -> Result<ResultSet> {
    let batch = prepare(transactions, policy)?;
    let jobs = estimation_jobs(&batch, policy, service_levels, batch_seed);
    let total = jobs.len();

    let mut estimates = HashMap::with_capacity(total);
    for job in jobs {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                completed: estimates.len(),
                total,
            }
            .into());
        }
        let (item_id, outcome) = job.run();
        estimates.insert(item_id, outcome);
    }

    Ok(assemble(&batch.metrics(), &batch.abc, &estimates))
}

/// Concurrent run on tokio blocking workers.
pub async fn run(
    transactions: &[Transaction],
    policy: &PolicyConfig,
    service_levels: &ServiceLevels,
    options: &RunOptions,
) -> Result<ResultSet> {
    let batch = prepare(transactions, policy)?;
    let jobs = estimation_jobs(&batch, policy, service_levels, options.batch_seed);
    let total = jobs.len();

    info!(
        "Estimating {} items ({} bootstrap samples, {} workers, seed {})",
        total,
        policy.bootstrap_samples,
        options.concurrency,
        options.batch_seed
    );

    let progress = progress_bar(total as u64, options.show_progress);

    let outcomes = stream::iter(jobs)
        .map(|job| {
            let cancel = options.cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                tokio::task::spawn_blocking(move || job.run())
                    .await
                    .map(Some)
                    .map_err(|e| PipelineError::Worker(e.to_string()))
            }
        })
        .buffered(options.concurrency.max(1));
    let mut outcomes = std::pin::pin!(outcomes);

    let mut estimates = HashMap::with_capacity(total);
    while let Some(outcome) = outcomes.next().await {
        match outcome? {
            Some((item_id, result)) => {
                estimates.insert(item_id, result);
                progress.inc(1);
            }
            None => {
                progress.abandon();
                return Err(PipelineError::Cancelled {
                    completed: estimates.len(),
                    total,
                }
                .into());
            }
        }
    }
    progress.finish_and_clear();

    Ok(assemble(&batch.metrics(), &batch.abc, &estimates))
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
