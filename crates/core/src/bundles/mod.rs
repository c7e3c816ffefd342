//! Automation bundle locations.
//!
//! A bundle couples a [`RobotKind`] to the on-disk directory holding its
//! scraping scripts, the command used to launch it, and the Python
//! distributions it needs. The real bundles are Python packages invoked as
//! `python3 -m src.main` with the bundle directory as working directory;
//! tests substitute arbitrary programs to stay hermetic.

use rk_protocol::RobotKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Python distributions the scraping bundles import.
const BUNDLE_PACKAGES: &[&str] = &["selenium", "webdriver-manager", "python-dotenv", "supabase"];

/// One launchable automation bundle.
#[derive(Debug, Clone)]
pub struct RobotBundle {
    pub kind: RobotKind,

    /// Working directory for the spawned process.
    pub dir: PathBuf,

    /// Program to execute (the Python interpreter for real bundles).
    pub program: PathBuf,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Python distributions this bundle requires.
    pub packages: Vec<String>,
}

impl RobotBundle {
    /// The standard bundle layout: `<root>/<kind>_automation`, launched as
    /// `python -m src.main`.
    pub fn standard(kind: RobotKind, root: &Path, python: &Path) -> Self {
        Self {
            kind,
            dir: root.join(format!("{kind}_automation")),
            program: python.to_path_buf(),
            args: vec!["-m".to_string(), "src.main".to_string()],
            packages: BUNDLE_PACKAGES.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// The closed set of bundles the runner may launch.
#[derive(Debug, Clone, Default)]
pub struct BundleSet {
    bundles: HashMap<RobotKind, RobotBundle>,
}

impl BundleSet {
    /// Standard bundles for every [`RobotKind`] under `root`.
    pub fn standard(root: &Path, python: &Path) -> Self {
        let mut set = Self::default();
        for kind in RobotKind::ALL {
            set.insert(RobotBundle::standard(kind, root, python));
        }
        set
    }

    /// Register (or replace) a bundle. Used by tests to swap in fakes.
    pub fn insert(&mut self, bundle: RobotBundle) {
        self.bundles.insert(bundle.kind, bundle);
    }

    /// Look up the bundle for `kind`, if registered.
    pub fn get(&self, kind: RobotKind) -> Option<&RobotBundle> {
        self.bundles.get(&kind)
    }

    /// All registered bundles, in [`RobotKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &RobotBundle> {
        RobotKind::ALL.iter().filter_map(|kind| self.bundles.get(kind))
    }

    /// Union of every bundle's required packages, deduplicated, in first-seen
    /// order.
    pub fn all_packages(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for bundle in self.iter() {
            for package in &bundle.packages {
                if !seen.contains(package) {
                    seen.push(package.clone());
                }
            }
        }
        seen
    }
}

/// Resolve the Python interpreter to launch bundles with.
///
/// An explicit override wins; otherwise `python3` is looked up on PATH. If
/// neither resolves, the bare name is returned so the spawn itself fails
/// and surfaces the missing interpreter as a run failure.
pub fn resolve_python(explicit: Option<PathBuf>) -> PathBuf {
    match explicit {
        Some(path) => path,
        None => which::which("python3").unwrap_or_else(|_| PathBuf::from("python3")),
    }
}
