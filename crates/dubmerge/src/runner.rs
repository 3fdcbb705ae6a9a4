use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use log::{error, info, warn};
use crate::error::{Error, Result};
use crate::job::{Job, JobMode, JobStatus, JobStore};
use crate::pairing::MatchedPair;
use crate::pipeline::{MergeResult, Pipeline};
use crate::sandbox::Sandbox;

/// Runs batches of pairs through the pipeline, one background task per batch
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    pipeline: Pipeline,
    sandbox: Sandbox,
}

/// Handle to a running batch; dropping it leaves the batch running
pub struct SubmittedJob {
    pub id: String,
    store: Arc<dyn JobStore>,
    handle: JoinHandle<()>,
}

impl SubmittedJob {
    /// Wait for the batch to reach a terminal state and return its final snapshot
    pub async fn wait(self) -> Option<Job> {
        if let Err(e) = self.handle.await {
            error!("[{}] supervisor task ended abnormally: {}", self.id, e);
        }
        self.store.get(&self.id)
    }
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Pipeline, sandbox: Sandbox) -> Self {
        Self { store, pipeline, sandbox }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Register a job for `pairs` and start processing it in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        pairs: Vec<MatchedPair>,
        mode: JobMode,
        destination: Option<PathBuf>,
    ) -> Result<SubmittedJob> {
        if pairs.is_empty() {
            return Err(Error::NoValidPaths);
        }

        let job = self.store.create(mode, pairs.len());
        let id = job.id.clone();
        info!("[{}] Submitted {} pair(s) ({} mode)", id, pairs.len(), mode);

        let worker = tokio::spawn(run_batch(
            self.store.clone(),
            self.pipeline.clone(),
            self.sandbox.clone(),
            id.clone(),
            pairs,
            destination,
        ));

        // A panicking worker must not leave the job stuck in `processing`
        let store = self.store.clone();
        let job_id = id.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!("[{}] ❌ worker failed: {}", job_id, e);
                store.update(&job_id, &mut |j| j.fail(format!("worker failed: {}", e)));
            }
        });

        Ok(SubmittedJob {
            id,
            store: self.store.clone(),
            handle,
        })
    }
}

async fn run_batch(
    store: Arc<dyn JobStore>,
    pipeline: Pipeline,
    sandbox: Sandbox,
    id: String,
    pairs: Vec<MatchedPair>,
    destination: Option<PathBuf>,
) {
    store.update(&id, &mut |j| j.status = JobStatus::Processing);
    let destination = destination.as_deref();

    for (idx, pair) in pairs.iter().enumerate() {
        info!("[{}] Processing pair {}/{}: {}", id, idx + 1, pairs.len(), pair.key);

        let result = match check_pair(&sandbox, pair, destination) {
            Ok(()) => pipeline.process_pair(pair, destination).await,
            Err(e) => {
                warn!("[{}] Skipping {}: {}", id, pair.key, e);
                MergeResult::failed(pair, None, e.to_string())
            }
        };

        store.update(&id, &mut |j| j.record_result(result.clone()));
    }

    if let Some(job) = store.update(&id, &mut |j| j.complete()) {
        info!(
            "[{}] ✅ Batch completed: {}/{} pair(s) merged",
            id,
            job.succeeded_count(),
            job.file_count
        );
    }
}

/// Every path a pair would touch must lie inside the sandbox
fn check_pair(sandbox: &Sandbox, pair: &MatchedPair, destination: Option<&Path>) -> Result<()> {
    sandbox.check(&pair.vo_path)?;
    sandbox.check(&pair.es_path)?;
    if let Some(dir) = destination {
        sandbox.check(dir)?;
    }
    Ok(())
}
