//! Spool-backed store of non-blocking job results
//!
//! Every job owns one entry under the spool directory, named by its job id.
//! An entry is a directory (or a symlink to one) holding the artifacts
//! `stdout`, `stderr`, `exitcode` and `status`. The status artifact is written
//! last; an entry without it is a job that is still running.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreError;

const STATUS_FILE: &str = "status";
const STDOUT_FILE: &str = "stdout";
const STDERR_FILE: &str = "stderr";
const EXITCODE_FILE: &str = "exitcode";

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Entry exists, no terminal status recorded yet
    Running,
    /// Action returned a result
    Completed,
    /// Action signalled a failure
    Failed,
}

impl JobStatus {
    /// On-disk representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Parse the on-disk representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Running" => Some(Self::Running),
            "Completed" => Some(Self::Completed),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted outcome of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Job id
    pub job_id: String,
    /// Lifecycle state
    pub status: JobStatus,
    /// Captured output
    pub stdout: String,
    /// Captured error output
    pub stderr: String,
    /// Exit code, when one was recorded
    pub exit_code: Option<i32>,
}

impl JobResult {
    /// Result of a job whose action succeeded
    pub fn completed(job_id: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Completed,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Result of a job whose action failed
    pub fn failed(job_id: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Status query payload
    pub fn to_json(&self) -> Value {
        let mut payload = json!({
            "status": self.status.as_str(),
            "stdout": self.stdout,
            "stderr": self.stderr,
        });
        if let Some(code) = self.exit_code {
            payload["exitcode"] = json!(code);
        }
        payload
    }
}

/// Filesystem map from job id to job result
#[derive(Debug, Clone)]
pub struct JobStore {
    spool_dir: PathBuf,
}

impl JobStore {
    /// Open a store rooted at `spool_dir`, creating the directory if needed
    pub async fn open(spool_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let spool_dir = spool_dir.into();
        fs::create_dir_all(&spool_dir).await?;
        debug!("Opened job spool at {:?}", spool_dir);
        Ok(Self { spool_dir })
    }

    /// Spool root
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Path of the entry for `job_id`
    pub fn entry_path(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_job_id(job_id) {
            return Err(StoreError::InvalidJobId(job_id.to_string()));
        }
        Ok(self.spool_dir.join(job_id))
    }

    /// Reserve a fresh entry; the job is implicitly Running from here on
    pub async fn create_entry(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        let path = self.entry_path(job_id)?;
        match fs::create_dir(&path).await {
            Ok(()) => {
                debug!("Created spool entry for job {}", job_id);
                Ok(path)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::DuplicateJobId(job_id.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Persist every artifact of `result`, status last
    pub async fn write_result(&self, result: &JobResult) -> Result<(), StoreError> {
        let path = self.entry_dir(&result.job_id).await?;

        write_artifact(&path, STDOUT_FILE, &result.stdout).await?;
        write_artifact(&path, STDERR_FILE, &result.stderr).await?;
        if let Some(code) = result.exit_code {
            write_artifact(&path, EXITCODE_FILE, &code.to_string()).await?;
        }
        write_artifact(&path, STATUS_FILE, result.status.as_str()).await?;

        debug!("Stored {} result for job {}", result.status, result.job_id);
        Ok(())
    }

    /// Read the current state of a job
    pub async fn read_result(&self, job_id: &str) -> Result<JobResult, StoreError> {
        let path = self.entry_dir(job_id).await?;

        let status = match read_optional(&path.join(STATUS_FILE)).await? {
            None => JobStatus::Running,
            Some(raw) => JobStatus::parse(raw.trim()).ok_or_else(|| StoreError::InvalidStatus {
                job_id: job_id.to_string(),
                value: raw,
            })?,
        };

        let exit_code = match read_optional(&path.join(EXITCODE_FILE)).await? {
            None => None,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(code) => Some(code),
                Err(_) => {
                    warn!("Ignoring unparsable exit code {:?} for job {}", raw, job_id);
                    None
                }
            },
        };

        Ok(JobResult {
            job_id: job_id.to_string(),
            status,
            stdout: read_optional(&path.join(STDOUT_FILE)).await?.unwrap_or_default(),
            stderr: read_optional(&path.join(STDERR_FILE)).await?.unwrap_or_default(),
            exit_code,
        })
    }

    /// Resolve an existing entry directory, following symlinks
    async fn entry_dir(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        let path = self.entry_path(job_id)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            Ok(_) => Err(StoreError::NotFound(job_id.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(job_id.to_string())),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// A job id must name exactly one entry directly under the spool root
fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id != "."
        && job_id != ".."
        && !job_id.contains(['/', '\\', '\0'])
}

/// Write one artifact via a synced temp file renamed into place, then sync
/// the entry directory so the rename itself is durable
async fn write_artifact(dir: &Path, name: &str, contents: &str) -> std::io::Result<()> {
    let temp_path = dir.join(format!(".{name}.tmp"));

    if let Err(e) = replace_via(&temp_path, &dir.join(name), contents).await {
        match fs::remove_file(&temp_path).await {
            Ok(()) => {}
            Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
            Err(cleanup) => warn!("Failed to remove {:?}: {}", temp_path, cleanup),
        }
        return Err(e);
    }

    sync_dir(dir).await
}

async fn replace_via(temp_path: &Path, target: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp_path, target).await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (JobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JobStore::open(temp_dir.path().join("spool")).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_open_creates_spool_dir() {
        let (store, _temp) = test_store().await;
        assert!(store.spool_dir().is_dir());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (store, _temp) = test_store().await;
        store.create_entry("job-1").await.unwrap();

        let result = JobResult {
            job_id: "job-1".to_string(),
            status: JobStatus::Completed,
            stdout: "OUT\n".to_string(),
            stderr: "ERR\n".to_string(),
            exit_code: Some(0),
        };
        store.write_result(&result).await.unwrap();

        let read = store.read_result("job-1").await.unwrap();
        assert_eq!(read, result);
        assert_eq!(read.stdout, "OUT\n");
        assert_eq!(read.stderr, "ERR\n");
    }

    #[tokio::test]
    async fn test_fresh_entry_reads_as_running() {
        let (store, _temp) = test_store().await;
        store.create_entry("job-2").await.unwrap();

        let read = store.read_result("job-2").await.unwrap();
        assert_eq!(read.status, JobStatus::Running);
        assert_eq!(read.stdout, "");
        assert_eq!(read.stderr, "");
        assert_eq!(read.exit_code, None);
    }

    #[tokio::test]
    async fn test_partial_write_reads_as_running() {
        let (store, _temp) = test_store().await;
        let path = store.create_entry("job-3").await.unwrap();
        std::fs::write(path.join(STDOUT_FILE), "half").unwrap();

        let read = store.read_result("job-3").await.unwrap();
        assert_eq!(read.status, JobStatus::Running);
        assert_eq!(read.stdout, "half");
    }

    #[tokio::test]
    async fn test_duplicate_entry() {
        let (store, _temp) = test_store().await;
        store.create_entry("job-4").await.unwrap();
        let err = store.create_entry("job-4").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateJobId(id) if id == "job-4"));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (store, _temp) = test_store().await;
        assert!(matches!(store.read_result("missing").await, Err(StoreError::NotFound(_))));

        let result = JobResult::completed("missing", "x");
        assert!(matches!(store.write_result(&result).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_job_ids() {
        let (store, _temp) = test_store().await;
        for job_id in ["", ".", "..", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(store.read_result(job_id).await, Err(StoreError::InvalidJobId(_))),
                "accepted {job_id:?}"
            );
            assert!(matches!(store.create_entry(job_id).await, Err(StoreError::InvalidJobId(_))));
        }
    }

    #[tokio::test]
    async fn test_failed_result() {
        let (store, _temp) = test_store().await;
        store.create_entry("job-5").await.unwrap();
        store.write_result(&JobResult::failed("job-5", "boom\n", 3)).await.unwrap();

        let read = store.read_result("job-5").await.unwrap();
        assert_eq!(read.status, JobStatus::Failed);
        assert_eq!(read.stderr, "boom\n");
        assert_eq!(read.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_corrupt_status() {
        let (store, _temp) = test_store().await;
        let path = store.create_entry("job-6").await.unwrap();
        std::fs::write(path.join(STATUS_FILE), "exploded").unwrap();

        assert!(matches!(
            store.read_result("job-6").await,
            Err(StoreError::InvalidStatus { value, .. }) if value == "exploded"
        ));
    }

    #[tokio::test]
    async fn test_status_whitespace_is_ignored() {
        let (store, _temp) = test_store().await;
        let path = store.create_entry("job-7").await.unwrap();
        std::fs::write(path.join(STATUS_FILE), "Completed\n").unwrap();

        let read = store.read_result("job-7").await.unwrap();
        assert_eq!(read.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (store, _temp) = test_store().await;
        let path = store.create_entry("job-8").await.unwrap();
        store.write_result(&JobResult::completed("job-8", "{}")).await.unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["exitcode", "status", "stderr", "stdout"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_artifact_write_removes_temp_file() {
        let (store, _temp) = test_store().await;
        let path = store.create_entry("job-9").await.unwrap();
        // A non-empty directory in place of the artifact makes the rename fail
        std::fs::create_dir(path.join(STDOUT_FILE)).unwrap();
        std::fs::write(path.join(STDOUT_FILE).join("keep"), "").unwrap();

        let err = store.write_result(&JobResult::completed("job-9", "{}")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let names: Vec<_> = std::fs::read_dir(&path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![STDOUT_FILE]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_entry() {
        let (store, temp) = test_store().await;
        let target = temp.path().join("elsewhere");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join(STATUS_FILE), "Completed").unwrap();
        std::fs::write(target.join(STDOUT_FILE), "***OUTPUT\n").unwrap();
        std::fs::write(target.join(STDERR_FILE), "***ERROR\n").unwrap();
        std::os::unix::fs::symlink(&target, store.spool_dir().join("linked")).unwrap();

        let read = store.read_result("linked").await.unwrap();
        assert_eq!(read.status, JobStatus::Completed);
        assert_eq!(read.stdout, "***OUTPUT\n");
        assert_eq!(read.stderr, "***ERROR\n");
        assert!(matches!(store.create_entry("linked").await, Err(StoreError::DuplicateJobId(_))));
    }

    #[test]
    fn test_result_json() {
        let payload = JobResult::failed("j", "bad", 2).to_json();
        assert_eq!(payload["status"], "Failed");
        assert_eq!(payload["stdout"], "");
        assert_eq!(payload["stderr"], "bad");
        assert_eq!(payload["exitcode"], 2);
    }
}
