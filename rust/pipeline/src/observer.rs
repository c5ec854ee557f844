// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-stage observability hook
//!
//! The pipeline emits exactly one [`StageReport`] per completed stage to an
//! injected [`PipelineObserver`]. Library code never prints.

use crate::error::Stage;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

/// Counts for one finished stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Items the stage consumed
    pub input: usize,
    /// Items the stage produced
    pub output: usize,
    /// Items dropped with a recoverable problem
    pub skipped: usize,
    pub elapsed: Duration,
    /// Stage-specific counters, in insertion order
    pub details: Vec<(&'static str, usize)>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            input: 0,
            output: 0,
            skipped: 0,
            elapsed: Duration::ZERO,
            details: Vec::new(),
        }
    }

    pub fn counts(mut self, input: usize, output: usize, skipped: usize) -> Self {
        self.input = input;
        self.output = output;
        self.skipped = skipped;
        self
    }

    pub fn detail(mut self, name: &'static str, value: usize) -> Self {
        self.details.push((name, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.details
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// Receives stage reports
pub trait PipelineObserver: Send + Sync {
    fn on_stage(&self, report: &StageReport);
}

/// Logs each report through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_stage(&self, report: &StageReport) {
        tracing::info!(
            stage = %report.stage,
            input = report.input,
            output = report.output,
            skipped = report.skipped,
            elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
            "stage complete"
        );
        for (name, value) in &report.details {
            tracing::debug!(
                stage = %report.stage,
                counter = *name,
                value = *value,
                "stage detail"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_stage(&self, _report: &StageReport) {}
}

/// Keeps every report, for tests and callers that want a summary
#[derive(Debug, Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<StageReport>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<StageReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn report(&self, stage: Stage) -> Option<StageReport> {
        self.reports().into_iter().find(|r| r.stage == stage)
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_stage(&self, report: &StageReport) {
        let mut reports = self
            .reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports.push(report.clone());
    }
}
