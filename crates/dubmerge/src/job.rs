use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use crate::pipeline::MergeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Completed,
    /// The worker itself died; per-pair failures still end in `Completed`
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Starting => "starting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What kind of library a batch was searched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Movie,
    Tv,
}

impl FromStr for JobMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(JobMode::Movie),
            "tv" | "series" => Ok(JobMode::Tv),
            other => Err(format!("unknown mode '{}', expected 'tv' or 'movie'", other)),
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobMode::Movie => "movie",
            JobMode::Tv => "tv",
        })
    }
}

/// One submitted batch of pairs and everything learned while processing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub mode: JobMode,
    pub status: JobStatus,
    pub file_count: usize,
    pub processed_count: usize,
    pub progress_percent: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub results: Vec<MergeResult>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: String, mode: JobMode, file_count: usize) -> Self {
        Self {
            id,
            mode,
            status: JobStatus::Starting,
            file_count,
            processed_count: 0,
            progress_percent: 0.0,
            start_time: Utc::now(),
            end_time: None,
            results: Vec::new(),
            error: None,
        }
    }

    /// Append a pair result and recompute progress
    pub fn record_result(&mut self, result: MergeResult) {
        self.results.push(result);
        self.processed_count += 1;
        self.progress_percent = progress_percent(self.processed_count, self.file_count);
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// `processed / total * 100`, exactly 100 once everything is processed
pub fn progress_percent(processed: usize, total: usize) -> f64 {
    if total == 0 || processed >= total {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

/// Registry of jobs shared between batch workers and status readers
pub trait JobStore: Send + Sync {
    /// Register a new job under a fresh unique id
    fn create(&self, mode: JobMode, file_count: usize) -> Job;

    /// Apply `f` to the stored job atomically; returns the updated snapshot
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> Option<Job>;

    fn get(&self, id: &str) -> Option<Job>;

    /// All jobs, oldest first
    fn list(&self) -> Vec<Job>;
}

/// Process-local `JobStore`
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, mode: JobMode, file_count: usize) -> Job {
        let mut jobs = self.jobs.write();
        let id = generate_id(Utc::now(), |candidate| jobs.contains_key(candidate));
        let job = Job::new(id.clone(), mode, file_count);
        jobs.insert(id, job.clone());
        job
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Job)) -> Option<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id)?;
        f(job);
        Some(job.clone())
    }

    fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        jobs
    }
}

/// Millisecond timestamp id, suffixed with `-N` while `taken` reports a collision
pub fn generate_id<F>(now: DateTime<Utc>, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = now.format("%Y%m%d%H%M%S%3f").to_string();
    if !taken(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn result(success: bool) -> MergeResult {
        MergeResult {
            vo_path: PathBuf::from("/m/a.en.mkv"),
            es_path: PathBuf::from("/m/a.es.mkv"),
            output_path: None,
            success,
            message: String::new(),
        }
    }

    #[test]
    fn test_id_format_and_collisions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(generate_id(now, |_| false), "20240309140507000");

        let taken = ["20240309140507000", "20240309140507000-1"];
        assert_eq!(generate_id(now, |c| taken.contains(&c)), "20240309140507000-2");
    }

    #[test]
    fn test_store_ids_are_unique() {
        let store = InMemoryJobStore::new();
        let ids: std::collections::HashSet<String> =
            (0..50).map(|_| store.create(JobMode::Tv, 1).id).collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(store.list().len(), 50);
    }

    #[test]
    fn test_update_and_get() {
        let store = InMemoryJobStore::new();
        let job = store.create(JobMode::Movie, 2);
        assert_eq!(job.status, JobStatus::Starting);

        let updated = store
            .update(&job.id, &mut |j| {
                j.status = JobStatus::Processing;
                j.record_result(result(true));
            })
            .unwrap();
        assert_eq!(updated.processed_count, 1);
        assert_eq!(updated.progress_percent, 50.0);
        assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Processing);

        assert!(store.update("missing", &mut |_| {}).is_none());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_terminal_states() {
        let mut job = Job::new("x".to_string(), JobMode::Tv, 1);
        assert!(!job.status.is_terminal());
        job.fail("worker panicked");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.status.is_terminal());
        assert!(job.end_time.is_some());
    }

    #[test]
    fn test_job_serializes_lowercase_enums() {
        let job = Job::new("x".to_string(), JobMode::Tv, 1);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "starting");
        assert_eq!(json["mode"], "tv");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("TV".parse::<JobMode>().unwrap(), JobMode::Tv);
        assert_eq!("movie".parse::<JobMode>().unwrap(), JobMode::Movie);
        assert!("music".parse::<JobMode>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_progress_monotonic(file_count in 1usize..200, outcomes in proptest::collection::vec(any::<bool>(), 0..200)) {
            let mut job = Job::new("p".to_string(), JobMode::Tv, file_count);
            let mut last = job.progress_percent;
            for ok in outcomes.into_iter().take(file_count) {
                job.record_result(result(ok));
                prop_assert!(job.progress_percent >= last);
                prop_assert_eq!(job.progress_percent == 100.0, job.processed_count == job.file_count);
                last = job.progress_percent;
            }
        }
    }
}
