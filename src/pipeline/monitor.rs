// src/pipeline/monitor.rs

//! One monitoring run.
//!
//! For every configured search: fetch, persist, diff against the previous
//! snapshot of the same lineage, and accumulate a digest. One digest mail is
//! sent per run when anything is new; a failed run sends one failure mail.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{Config, LineageKey, Snapshot, Timestamp};
use crate::notify::Notifier;
use crate::pipeline::digest::{self, Digest};
use crate::pipeline::{ChangeDetector, JobRunner};
use crate::services::{DataSource, SourceProvider};
use crate::storage::SnapshotStore;
use crate::utils::log::{header, sub_item, summary};

/// What a completed run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub timestamp: Option<Timestamp>,
    /// Lineages fetched successfully
    pub lineages: usize,
    /// Snapshots written
    pub saved: usize,
    /// New records over all lineages
    pub new_items: usize,
    /// Whether a digest was handed to the notifier
    pub notified: bool,
    /// Lineages skipped because their search failed (isolated mode only)
    pub failures: Vec<(LineageKey, AppError)>,
}

/// Result of one scheduled run.
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded(RunReport),
    Failed(AppError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded(_))
    }
}

/// Runs the fetch → persist → diff → notify workflow.
pub struct Monitor {
    config: Arc<Config>,
    source: Box<dyn SourceProvider>,
    store: Box<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    detector: ChangeDetector,
}

impl Monitor {
    pub fn new(
        config: Arc<Config>,
        source: Box<dyn SourceProvider>,
        store: Box<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let detector = ChangeDetector::new(config.run.identity);
        Self {
            config,
            source,
            store,
            notifier,
            detector,
        }
    }

    fn subject_prefix(&self) -> &str {
        &self.config.email.subject_prefix
    }

    /// Run once, stamping every snapshot with `timestamp`.
    pub async fn run_at(&mut self, timestamp: Timestamp) -> RunOutcome {
        header(&format!("Monitoring run {timestamp}"));
        let started = Instant::now();

        match self.execute(timestamp).await {
            Ok(mut report) => {
                report.timestamp = Some(timestamp);
                summary(
                    "Run complete",
                    &[
                        ("Searches", report.lineages.to_string()),
                        ("Snapshots saved", report.saved.to_string()),
                        ("New items", report.new_items.to_string()),
                        ("Failed searches", report.failures.len().to_string()),
                        ("Elapsed", format!("{:.1?}", started.elapsed())),
                    ],
                );
                RunOutcome::Succeeded(report)
            }
            Err(error) => {
                log::error!("Error in job execution ({}): {}", error.kind(), error);
                let prefix = self.subject_prefix().to_string();
                self.notify(
                    &digest::failure_subject(&prefix),
                    &digest::failure_body(&prefix, &error),
                    &[],
                )
                .await;
                RunOutcome::Failed(error)
            }
        }
    }

    /// Open a session, process every lineage, and always close the session.
    async fn execute(&mut self, timestamp: Timestamp) -> Result<RunReport> {
        let mut session = self.source.open().await?;
        let result = self.process_lineages(session.as_mut(), timestamp).await;
        if let Err(e) = session.close().await {
            log::warn!("Failed to close source session: {e}");
        }
        let (mut report, digest) = result?;

        let prefix = self.subject_prefix().to_string();
        if digest.has_new_items() {
            report.notified = self
                .notify(&digest.subject(&prefix), &digest.body(), digest.attachments())
                .await;
        } else {
            log::info!("No new items found");
        }

        if !report.failures.is_empty() {
            self.notify(
                &digest::failure_subject(&prefix),
                &digest::skipped_lineages_body(&prefix, &report.failures),
                &[],
            )
            .await;
        }

        Ok(report)
    }

    async fn process_lineages(
        &mut self,
        session: &mut dyn DataSource,
        timestamp: Timestamp,
    ) -> Result<(RunReport, Digest)> {
        let mut report = RunReport::default();
        let mut digest = Digest::new();
        let config = Arc::clone(&self.config);

        for (category, filter) in config.lineages() {
            let lineage = LineageKey::new(category, filter.name.clone());
            log::info!("Running {category} search for {}", filter.name);

            let records = match session.search(category, filter).await {
                Ok(records) => records,
                Err(error)
                    if config.run.isolate_source_failures
                        && error.kind() == ErrorKind::SourceFetch =>
                {
                    log::error!("Skipping {lineage}: {error}");
                    report.failures.push((lineage, error));
                    continue;
                }
                Err(error) => return Err(error),
            };
            report.lineages += 1;

            if records.is_empty() {
                log::info!("No results for {lineage}; nothing saved");
                continue;
            }

            // Read the baseline before saving: a failed read must leave no new artifact
            let previous = self.store.latest_before(&lineage, timestamp).await?;
            let snapshot = Snapshot::new(category, filter.name.clone(), timestamp, records);
            let path = self.store.save(&snapshot).await?;
            report.saved += 1;
            digest.attach(path);

            let changes = self.detector.diff(&snapshot, previous.as_ref());
            if changes.first_run {
                sub_item(&format!("{lineage}: first run, {} records", changes.len()));
            } else {
                sub_item(&format!("{lineage}: {} new records", changes.len()));
            }
            report.new_items += changes.len();
            digest.add(lineage, changes);
        }

        Ok((report, digest))
    }

    /// Send a notification, logging instead of propagating failures.
    async fn notify(&self, subject: &str, body: &str, attachments: &[std::path::PathBuf]) -> bool {
        match self.notifier.send(subject, body, attachments).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error sending notification '{subject}': {e}");
                false
            }
        }
    }
}

#[async_trait]
impl JobRunner for Monitor {
    async fn run_job(&mut self) -> RunOutcome {
        self.run_at(Timestamp::now()).await
    }
}
