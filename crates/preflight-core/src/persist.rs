use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Settings directory the helper keeps inside a project root.
pub const SETTINGS_DIR: &str = ".preflight";
/// Single-line file holding the most recently discovered test binary path.
pub const TARGET_FILE: &str = "test-binary";
/// Append-only JSONL history of helper runs.
pub const RUN_LOG_FILE: &str = "runs.jsonl";
/// Optional TOML configuration file, repo-level or user-level.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    BuildFailed,
    NoBinaryFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub seq: u64,
    pub ts_ms: i64,
    pub exit_code: i32,
    pub binary_path: Option<String>,
    pub status: RunStatus,
}

/// The file a debugger host reads to find the program to launch. One path
/// per successful run, overwritten, never appended.
#[derive(Debug)]
pub struct TargetFile {
    path: PathBuf,
}

impl TargetFile {
    pub fn in_repo(repo: &Path) -> Self {
        Self {
            path: repo.join(SETTINGS_DIR).join(TARGET_FILE),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, binary: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{binary}\n"))
    }

    pub fn read(&self) -> std::io::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

#[derive(Debug)]
pub struct RunLogStore {
    path: PathBuf,
    next_seq: u64,
}

impl RunLogStore {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let existing = load_records(path.as_path())?;
        let next_seq = existing
            .iter()
            .map(|record| record.seq)
            .max()
            .map_or(1, |seq| seq.saturating_add(1));
        Ok(Self { path, next_seq })
    }

    pub fn in_repo(repo: &Path) -> std::io::Result<Self> {
        Self::open(repo.join(SETTINGS_DIR).join(RUN_LOG_FILE))
    }

    pub fn append(
        &mut self,
        exit_code: i32,
        binary_path: Option<String>,
        status: RunStatus,
    ) -> std::io::Result<u64> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let record = RunRecord {
            seq,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            exit_code,
            binary_path,
            status,
        };
        let line = serde_json::to_string(&record)
            .map_err(|err| std::io::Error::other(format!("serialize: {err}")))?;
        append_line(self.path.as_path(), line.as_str())?;
        Ok(seq)
    }

    pub fn load(&self) -> std::io::Result<Vec<RunRecord>> {
        load_records(self.path.as_path())
    }
}

/// Newest run that actually produced a binary path.
pub fn latest_success(records: &[RunRecord]) -> Option<&RunRecord> {
    records
        .iter()
        .filter(|record| record.status == RunStatus::Succeeded)
        .max_by_key(|record| record.seq)
}

fn load_records(path: &Path) -> std::io::Result<Vec<RunRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<RunRecord>(&line) {
            records.push(record);
        }
    }
    Ok(records)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}
