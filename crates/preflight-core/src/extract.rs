use std::fmt;

use serde::Deserialize;

use crate::config::SelectionStrategy;

/// Fixed substring that announces a produced executable in plain build logs.
pub const EXECUTABLE_MARKER: &str = "Executable";

/// One structured record from the build tool's line-delimited output. Only
/// the fields the extractor cares about are modeled; everything else in the
/// record is ignored.
#[derive(Debug, Deserialize)]
struct ArtifactRecord {
    #[serde(default)]
    profile: Option<ArtifactProfile>,
    #[serde(default)]
    filenames: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactProfile {
    #[serde(default)]
    test: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A line that looked like a structured record was not valid JSON.
    /// Only the structured mode can fail; the plain-log scan never does.
    Parse { line: usize, reason: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { line, reason } => {
                write!(f, "malformed build record on line {line}: {reason}")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Pulls the produced test binary's path out of captured build output.
///
/// Combined output from a structured build carries JSON records on stdout
/// and human compiler chatter on stderr, so both forms may be present in
/// the same text. Structured records are preferred; the plain-log marker
/// scan runs when they yield nothing. Returns `Ok(None)` when neither form
/// announces a binary.
pub fn extract_binary_path(
    output: &str,
    strategy: SelectionStrategy,
) -> Result<Option<String>, ExtractError> {
    let has_records = output
        .lines()
        .any(|line| line.trim_start().starts_with('{'));
    if has_records {
        if let Some(path) = extract_from_records(output, strategy)? {
            return Ok(Some(path));
        }
    }
    Ok(extract_from_log(output, strategy))
}

/// Structured mode: scan line-delimited JSON records for test artifacts.
///
/// A record is a candidate when its `profile.test` flag is true and it lists
/// at least one produced filename; the candidate chosen by `strategy`
/// contributes its first filename. Lines that do not start with `{` are
/// chatter interleaved by the build tool and are skipped; a `{` line that
/// fails to parse is a malformed record and aborts the scan.
pub fn extract_from_records(
    output: &str,
    strategy: SelectionStrategy,
) -> Result<Option<String>, ExtractError> {
    let mut chosen = None;
    for (index, line) in output.lines().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        let record =
            serde_json::from_str::<ArtifactRecord>(trimmed).map_err(|err| ExtractError::Parse {
                line: index + 1,
                reason: err.to_string(),
            })?;
        if !record.profile.as_ref().is_some_and(|profile| profile.test) {
            continue;
        }
        let Some(first) = record.filenames.first() else {
            continue;
        };
        let candidate = normalize_candidate(first);
        if candidate.is_empty() {
            continue;
        }
        match strategy {
            SelectionStrategy::First => return Ok(Some(candidate)),
            SelectionStrategy::Last => chosen = Some(candidate),
        }
    }
    Ok(chosen)
}

/// Unstructured mode: scan a plain build log for the executable marker.
///
/// The line chosen by `strategy` contributes its last whitespace-delimited
/// token. This scan never fails; no matching line means no result.
pub fn extract_from_log(output: &str, strategy: SelectionStrategy) -> Option<String> {
    let mut chosen = None;
    for line in output.lines() {
        if !line.contains(EXECUTABLE_MARKER) {
            continue;
        }
        let Some(token) = line.split_whitespace().last() else {
            continue;
        };
        let candidate = normalize_candidate(token);
        if candidate.is_empty() {
            continue;
        }
        match strategy {
            SelectionStrategy::First => return Some(candidate),
            SelectionStrategy::Last => chosen = Some(candidate),
        }
    }
    chosen
}

/// Trim, strip one enclosing pair of parentheses, then one pair of double
/// quotes. `("/a/b/c")` and `/a/b/c` normalize to the same path.
fn normalize_candidate(raw: &str) -> String {
    let mut candidate = raw.trim();
    if let Some(inner) = candidate
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        candidate = inner;
    }
    if let Some(inner) = candidate
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        candidate = inner;
    }
    candidate.trim().to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn single_test_record_yields_first_filename() {
        let output = r#"{"profile":{"test":true},"filenames":[" /tmp/deps/app-1234 "]}"#;
        let path = extract_from_records(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, Some("/tmp/deps/app-1234".to_string()));
    }

    #[test]
    fn first_matching_record_wins_over_later_ones() {
        let output = concat!(
            r#"{"profile":{"test":true},"filenames":["/tmp/t1","/tmp/t2"]}"#,
            "\n",
            r#"{"profile":{"test":false},"filenames":["/tmp/x"]}"#,
        );
        let path = extract_from_records(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, Some("/tmp/t1".to_string()));
    }

    #[test]
    fn last_strategy_picks_final_matching_record() {
        let output = concat!(
            r#"{"profile":{"test":true},"filenames":["/tmp/t1"]}"#,
            "\n",
            r#"{"profile":{"test":true},"filenames":["/tmp/t2"]}"#,
        );
        let path = extract_from_records(output, SelectionStrategy::Last).expect("extract");
        assert_eq!(path, Some("/tmp/t2".to_string()));
    }

    #[test]
    fn no_matching_record_is_absent_not_an_error() {
        let output = concat!(
            r#"{"profile":{"test":false},"filenames":["/tmp/x"]}"#,
            "\n",
            r#"{"reason":"build-finished","success":true}"#,
        );
        let path = extract_from_records(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, None);
    }

    #[test]
    fn record_without_filenames_is_skipped() {
        let output = concat!(
            r#"{"profile":{"test":true},"filenames":[]}"#,
            "\n",
            r#"{"profile":{"test":true},"filenames":["/tmp/t9"]}"#,
        );
        let path = extract_from_records(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, Some("/tmp/t9".to_string()));
    }

    #[test]
    fn malformed_record_reports_its_line_number() {
        let output = concat!(
            r#"{"profile":{"test":false},"filenames":[]}"#,
            "\n",
            "{not json at all",
        );
        let err = extract_from_records(output, SelectionStrategy::First)
            .expect_err("malformed record should fail");
        match err {
            ExtractError::Parse { line, .. } => assert_eq!(line, 2),
        }
    }

    #[test]
    fn compiler_chatter_between_records_is_skipped() {
        let output = concat!(
            "   Compiling preflight v0.1.0\n",
            r#"{"profile":{"test":true},"filenames":["/tmp/deps/pf-ab12"]}"#,
            "\n",
            "    Finished `test` profile [unoptimized + debuginfo]\n",
        );
        let path = extract_binary_path(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, Some("/tmp/deps/pf-ab12".to_string()));
    }

    #[test]
    fn marker_line_token_is_stripped_of_parens_and_quotes() {
        let output = "    Finished dev target(s) in 0.52s\n  Executable unittests src/lib.rs (\"/a/b/c\")\n";
        let path = extract_from_log(output, SelectionStrategy::First);
        assert_eq!(path, Some("/a/b/c".to_string()));
    }

    #[test]
    fn marker_line_without_decoration_passes_through() {
        let output = "Executable /target/debug/deps/game-77aa\n";
        let path = extract_from_log(output, SelectionStrategy::First);
        assert_eq!(path, Some("/target/debug/deps/game-77aa".to_string()));
    }

    #[test]
    fn log_without_marker_is_absent() {
        let output = "   Compiling acquire v0.3.0\n    Finished in 4.2s\n";
        assert_eq!(extract_from_log(output, SelectionStrategy::First), None);
    }

    #[test]
    fn last_strategy_on_log_picks_final_marker_line() {
        let output = concat!(
            "  Executable tests/a.rs (/tmp/a)\n",
            "  Executable tests/b.rs (/tmp/b)\n",
        );
        let path = extract_from_log(output, SelectionStrategy::Last);
        assert_eq!(path, Some("/tmp/b".to_string()));
    }

    #[test]
    fn structured_output_falls_back_to_log_scan_when_records_yield_nothing() {
        let output = concat!(
            r#"{"reason":"compiler-message"}"#,
            "\n",
            "  Executable (/tmp/fallback)\n",
        );
        let path = extract_binary_path(output, SelectionStrategy::First).expect("extract");
        assert_eq!(path, Some("/tmp/fallback".to_string()));
    }

    #[test]
    fn extraction_is_idempotent_over_the_same_text() {
        let output = concat!(
            r#"{"profile":{"test":true},"filenames":["/tmp/t1","/tmp/t2"]}"#,
            "\n",
            r#"{"profile":{"test":false},"filenames":["/tmp/x"]}"#,
        );
        let first = extract_binary_path(output, SelectionStrategy::First).expect("extract");
        let second = extract_binary_path(output, SelectionStrategy::First).expect("extract");
        assert_eq!(first, second);
        assert_eq!(first, Some("/tmp/t1".to_string()));
    }

    #[test]
    fn empty_input_is_absent() {
        assert_eq!(
            extract_binary_path("", SelectionStrategy::First).expect("extract"),
            None
        );
    }
}
