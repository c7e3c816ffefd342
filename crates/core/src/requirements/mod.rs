//! Python requirements probe and installer for the automation bundles.
//!
//! The scraping bundles need a handful of pip distributions. The probe is
//! side-effect free: one `pip list` invocation, parsed and compared
//! against the bundles' declared requirements. Installation shells out to
//! `pip install` and deliberately blocks until the package manager
//! finishes; it is the one synchronous operation in the system.

use crate::bundles::{BundleSet, RobotBundle};
use rk_protocol::RequirementsReport;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// How many trailing diagnostic lines an install failure carries.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Errors from requirement installation. The probe never errors: a broken
/// pip simply reports every package as missing.
#[derive(Error, Debug)]
pub enum RequirementsError {
    /// pip could not be invoked at all.
    #[error("failed to invoke {program}: {source}")]
    PipUnavailable {
        program: String,
        source: std::io::Error,
    },

    /// pip ran and exited nonzero.
    #[error("package installation failed (exit code {code:?}): {details}")]
    InstallFailed { code: Option<i32>, details: String },
}

/// Report which of the bundles' required packages are importable.
///
/// Runs `python -m pip list --format=freeze` once. If pip cannot be
/// invoked, everything is reported missing rather than failing the caller.
pub async fn check(python: &Path, bundles: &BundleSet) -> RequirementsReport {
    let installed = match Command::new(python)
        .args(["-m", "pip", "list", "--format=freeze"])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            parse_freeze_output(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::warn!(
                code = ?output.status.code(),
                "pip list failed; reporting all packages missing"
            );
            HashSet::new()
        }
        Err(err) => {
            tracing::warn!("could not invoke pip: {err}");
            HashSet::new()
        }
    };

    let mut packages = BTreeMap::new();
    let mut missing = Vec::new();
    for name in bundles.all_packages() {
        let present = installed.contains(&normalize_name(&name));
        if !present {
            missing.push(name.clone());
        }
        packages.insert(name, present);
    }

    RequirementsReport {
        installed: missing.is_empty(),
        packages,
        missing,
    }
}

/// Install the packages one bundle requires. Blocks until pip finishes.
pub async fn install(python: &Path, bundle: &RobotBundle) -> Result<(), RequirementsError> {
    tracing::info!(robot = %bundle.kind, "installing requirements");

    let output = Command::new(python)
        .args(["-m", "pip", "install"])
        .args(&bundle.packages)
        .output()
        .await
        .map_err(|source| RequirementsError::PipUnavailable {
            program: python.display().to_string(),
            source,
        })?;

    if output.status.success() {
        tracing::info!(robot = %bundle.kind, "requirements installed");
        Ok(())
    } else {
        Err(RequirementsError::InstallFailed {
            code: output.status.code(),
            details: diagnostic_tail(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// Distribution names from `pip list --format=freeze` output, normalized.
fn parse_freeze_output(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let name = line.split("==").next()?.trim();
            if name.is_empty() || name.starts_with('#') {
                None
            } else {
                Some(normalize_name(name))
            }
        })
        .collect()
}

/// pip treats names case-insensitively and `-`/`_` as equivalent.
fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_freeze_output() {
        let installed = parse_freeze_output(
            "selenium==4.21.0\nWebDriver_Manager==4.0.1\npython-dotenv==1.0.1\n",
        );
        assert!(installed.contains("selenium"));
        assert!(installed.contains("webdriver-manager"));
        assert!(installed.contains("python-dotenv"));
        assert!(!installed.contains("supabase"));
    }

    #[test]
    fn test_parse_freeze_skips_comments_and_blanks() {
        let installed = parse_freeze_output("# editable installs\n\nrequests==2.32.0\n");
        assert_eq!(installed.len(), 1);
        assert!(installed.contains("requests"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("WebDriver_Manager"), "webdriver-manager");
    }

    #[test]
    fn test_diagnostic_tail_is_bounded() {
        let stderr: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let tail = diagnostic_tail(&stderr);
        assert_eq!(tail.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(tail.ends_with("line 99"));
    }

    #[tokio::test]
    async fn test_check_with_unavailable_interpreter_reports_all_missing() {
        let bundles = BundleSet::standard(Path::new("."), Path::new("python3"));
        let report = check(Path::new("/nonexistent/python3"), &bundles).await;

        assert!(!report.installed);
        assert_eq!(report.missing.len(), bundles.all_packages().len());
        assert!(report.packages.values().all(|present| !present));
    }
}
