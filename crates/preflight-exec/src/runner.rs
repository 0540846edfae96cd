use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::thread;

use tempfile::Builder;
use tempfile::NamedTempFile;

use preflight_core::config::BuildConfig;

/// Exit status and combined output of one build-tool invocation. Consumed
/// by the extractor immediately after the call; a non-zero `exit_code` is
/// data for the caller, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub exit_code: i32,
    pub combined_output: String,
}

#[derive(Debug)]
pub enum BuildError {
    /// The build tool is not on the executable search path.
    ToolNotFound { program: String },
    /// The child process could not be started or waited on.
    Spawn { program: String, source: io::Error },
    /// The scratch log could not be created, written, or read back.
    Scratch { source: io::Error },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound { program } => {
                write!(f, "build tool `{program}` not found on PATH")
            }
            Self::Spawn { program, source } => {
                write!(f, "failed to run build tool `{program}`: {source}")
            }
            Self::Scratch { source } => write!(f, "scratch log failure: {source}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ToolNotFound { .. } => None,
            Self::Spawn { source, .. } | Self::Scratch { source } => Some(source),
        }
    }
}

/// Compiles test binaries without running them and captures the combined
/// output for the extractor.
///
/// Blocks until the child exits and all output has been read. Stdout is
/// teed into a scratch log on disk while stderr drains on a helper thread;
/// once the child exits the stderr text is appended to the scratch log and
/// the whole capture is read back as `combined_output`. The scratch file is
/// removed on every exit path, error paths included, by being scoped to
/// this call.
pub fn run_test_build(cwd: &Path, cfg: &BuildConfig) -> Result<BuildResult, BuildError> {
    let mut scratch = open_scratch(cfg).map_err(|source| BuildError::Scratch { source })?;

    let mut child = Command::new(&cfg.program)
        .current_dir(cwd)
        .args(&cfg.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                BuildError::ToolNotFound {
                    program: cfg.program.clone(),
                }
            } else {
                BuildError::Spawn {
                    program: cfg.program.clone(),
                    source,
                }
            }
        })?;

    let stderr_handle = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    if let Some(mut stdout) = child.stdout.take() {
        io::copy(&mut stdout, &mut scratch).map_err(|source| BuildError::Scratch { source })?;
    }

    let status = child.wait().map_err(|source| BuildError::Spawn {
        program: cfg.program.clone(),
        source,
    })?;

    let stderr_text = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if !stderr_text.is_empty() {
        write_stderr_tail(&mut scratch, &stderr_text)
            .map_err(|source| BuildError::Scratch { source })?;
    }

    let captured = fs::read(scratch.path()).map_err(|source| BuildError::Scratch { source })?;
    let combined_output = String::from_utf8_lossy(&captured).into_owned();

    Ok(BuildResult {
        exit_code: status.code().unwrap_or(-1),
        combined_output,
    })
}

fn open_scratch(cfg: &BuildConfig) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix("preflight-build-").suffix(".log");
    match &cfg.scratch_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            builder.tempfile_in(dir)
        }
        None => builder.tempfile(),
    }
}

fn write_stderr_tail(scratch: &mut NamedTempFile, stderr_text: &str) -> io::Result<()> {
    scratch.write_all(b"\n")?;
    scratch.write_all(stderr_text.as_bytes())?;
    scratch.flush()
}
