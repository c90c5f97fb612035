//! Differential run orchestration.
//!
//! For each template the matrix is expanded point by point on a rayon
//! pool. Per point: generate the kernel, hand it to the driver, compute
//! the oracle output while the driver works, then compare. Failures stay
//! local to their point; only a pool build error aborts a run.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, debug_span, info, warn};

use crate::codegen;
use crate::compare::Comparator;
use crate::config::RunConfig;
use crate::driver::{self, DriverSlots, ExecutionDriver, PendingExecution};
use crate::error::{DifftestError, ExecutionFailure};
use crate::matrix::{MatrixBuilder, MatrixPoint, Selection};
use crate::oracle::Oracle;
use crate::registry::Registry;
use crate::report::{RunReport, TemplateRejection, TestResult};
use crate::template::{Template, TemplateStore};

pub struct Runner<'a> {
    registry: &'a Registry,
    oracle: Oracle<'a>,
    comparator: Comparator,
    driver: Arc<dyn ExecutionDriver>,
    /// Bounds calls in flight, including ones abandoned after a timeout.
    slots: DriverSlots,
    config: RunConfig,
    selection: Selection,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a Registry, driver: Arc<dyn ExecutionDriver>, config: RunConfig) -> Self {
        Self {
            registry,
            oracle: Oracle::new(registry),
            comparator: config.comparator(),
            slots: DriverSlots::new(driver.concurrency_limit()),
            driver,
            config,
            selection: Selection::all(),
        }
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Oracle<'a>) -> Self {
        self.oracle = oracle;
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Pool size: configured jobs, capped by what the driver accepts.
    pub fn workers(&self) -> usize {
        let jobs = if self.config.jobs == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZero::get)
        } else {
            self.config.jobs
        };
        jobs.min(self.driver.concurrency_limit()).max(1)
    }

    /// Run every selected point of every template in `store`.
    ///
    /// A template whose first point does not expand is rejected as a whole
    /// and recorded in the report; the remaining templates still run.
    /// Returns only once every driver call, including timed-out ones, has
    /// ended.
    ///
    /// # Errors
    ///
    /// Returns [`DifftestError::WorkerPool`] if the thread pool cannot be
    /// built.
    pub fn run(&self, store: &TemplateStore) -> Result<RunReport, DifftestError> {
        let workers = self.workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pdt-worker-{i}"))
            .build()?;
        info!(
            driver = self.driver.name(),
            workers,
            seed = self.config.seed,
            shift_policy = %self.registry.shift_policy(),
            "starting run"
        );

        let mut results = Vec::new();
        let mut rejected = Vec::new();
        for template in store.iter() {
            let matrix = MatrixBuilder::new(self.registry, template, self.config.matrix_options())
                .with_selection(self.selection.clone());
            let Some(first) = matrix.points().next() else {
                debug!(template = %template.id, "no selected points");
                continue;
            };
            if let Err(e) = codegen::expand(template, &first) {
                warn!(template = %template.id, error = %e, "template rejected");
                rejected.push(TemplateRejection {
                    template: template.id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            info!(template = %template.id, points = matrix.len(), "running template");
            let batch: Vec<TestResult> = pool.install(|| {
                matrix
                    .points()
                    .par_bridge()
                    .map(|point| self.run_point(template, &point))
                    .collect()
            });
            let failed = batch.iter().filter(|r| !r.passed()).count();
            info!(template = %template.id, passed = batch.len() - failed, failed, "template done");
            results.extend(batch);
        }

        if self.slots.in_use() > 0 {
            debug!(in_flight = self.slots.in_use(), "waiting for timed-out driver calls");
        }
        self.slots.wait_idle();

        let report = RunReport::new(self.config.seed, results, rejected);
        info!(
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed(),
            rejected = report.summary.rejected_templates,
            "run complete"
        );
        Ok(report)
    }

    /// Generate, execute and check one point.
    pub fn run_point(&self, template: &Template, point: &MatrixPoint) -> TestResult {
        let _span = debug_span!("point", name = %point.name).entered();

        let kernel = match codegen::expand(template, point) {
            Ok(kernel) => kernel,
            Err(e) => return TestResult::generation_failure(point, e.to_string()),
        };
        let pending = driver::submit(
            Arc::clone(&self.driver),
            &self.slots,
            kernel,
            point.inputs.clone(),
            vec![point.output_spec()],
            self.config.timeout(),
        );
        let expected = match self.oracle.expected_output(point) {
            Ok(buffer) => buffer,
            Err(e) => return TestResult::generation_failure(point, e.to_string()),
        };
        let actual = pending
            .and_then(PendingExecution::wait)
            .and_then(|outputs| {
                outputs.into_iter().next().ok_or_else(|| ExecutionFailure::MissingOutput {
                    name: point.output_spec().name,
                })
            });
        let actual = match actual {
            Ok(buffer) => buffer,
            Err(failure) => {
                warn!(point = %point.name, %failure, "execution failed");
                return TestResult::execution_failure(point, failure.to_string());
            }
        };

        let result = self.comparator.compare(point, expected, actual);
        debug!(outcome = result.outcome.label(), "point done");
        result
    }
}
