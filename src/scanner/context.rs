//! Scan context: the read-only view of a project shared by every scanner.
//!
//! The ScanContext provides:
//! - The absolute project root and project name
//! - A lazily built, memoized file index with glob lookup
//! - Scanner settings from the project configuration
//! - Results of earlier priority stages (for dependency-gated applicability)
//! - An optional deadline for the current scanner invocation
//!
//! Cloning is cheap: the file index is shared, so derived contexts (with a
//! deadline or a newer results snapshot) see the same file discovery results.

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use walkdir::WalkDir;

use super::{ScanError, ScanResult};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".gradle",
];

/// An immutable, re-iterable set of files matching a glob.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Arc<[PathBuf]>,
}

impl FileSet {
    fn new(files: Vec<PathBuf>) -> Self {
        Self { files: files.into() }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.files
    }

    /// Union with another set, preserving order and dropping duplicates.
    pub fn union(&self, other: &FileSet) -> FileSet {
        let mut seen = std::collections::HashSet::new();
        let files = self
            .files
            .iter()
            .chain(other.files.iter())
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect();
        FileSet::new(files)
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// File discovery shared by all clones of a context.
struct FileIndex {
    root: PathBuf,
    excludes: GlobSet,
    /// Relative (forward-slash) path and absolute path of every regular file.
    files: OnceCell<Result<Arc<Vec<(String, PathBuf)>>, String>>,
    by_pattern: RwLock<HashMap<String, FileSet>>,
}

impl FileIndex {
    fn entries(&self) -> Result<Arc<Vec<(String, PathBuf)>>, ScanError> {
        self.files
            .get_or_init(|| self.walk().map(Arc::new))
            .clone()
            .map_err(|reason| ScanError::RootUnreadable {
                path: self.root.clone(),
                reason,
            })
    }

    fn walk(&self) -> Result<Vec<(String, PathBuf)>, String> {
        // The root itself must be listable; anything below it is best effort.
        std::fs::read_dir(&self.root).map_err(|e| e.to_string())?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !SKIPPED_DIRS.contains(&name.as_ref())
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let abs = entry.path().to_path_buf();
            let rel = relative_slash_path(&self.root, &abs);
            if self.excludes.is_match(&rel) {
                continue;
            }
            files.push((rel, abs));
        }
        tracing::debug!(root = %self.root.display(), files = files.len(), "indexed project files");
        Ok(files)
    }
}

/// Read-only handle to the project being scanned.
#[derive(Clone)]
pub struct ScanContext {
    root: PathBuf,
    project_name: String,
    index: Arc<FileIndex>,
    settings: Arc<BTreeMap<String, String>>,
    previous_results: Arc<BTreeMap<String, ScanResult>>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("root", &self.root)
            .field("project_name", &self.project_name)
            .field("previous_results", &self.previous_results.len())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ScanContext {
    /// Create a context for the given project root.
    ///
    /// The root is made absolute but not checked; an unreadable root surfaces
    /// as a [`ScanError::RootUnreadable`] from [`ScanContext::find_files`].
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::from_parts(absolute(root.as_ref()), GlobSet::empty())
    }

    /// Create a context whose file index skips paths matching any of `excludes`.
    pub fn with_excludes<P: AsRef<Path>>(root: P, excludes: &[String]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in excludes {
            builder.add(compile_glob(pattern)?);
        }
        let excludes = builder.build().map_err(|e| ScanError::InvalidGlob {
            pattern: excludes.join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self::from_parts(absolute(root.as_ref()), excludes))
    }

    fn from_parts(root: PathBuf, excludes: GlobSet) -> Self {
        let project_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());

        Self {
            index: Arc::new(FileIndex {
                root: root.clone(),
                excludes,
                files: OnceCell::new(),
                by_pattern: RwLock::new(HashMap::new()),
            }),
            root,
            project_name,
            settings: Arc::new(BTreeMap::new()),
            previous_results: Arc::new(BTreeMap::new()),
            deadline: None,
        }
    }

    /// Override the project name (defaults to the root directory name).
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Attach scanner settings.
    pub fn with_settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Derive a context carrying a snapshot of earlier scanners' results.
    pub fn with_previous_results(&self, results: BTreeMap<String, ScanResult>) -> Self {
        let mut ctx = self.clone();
        ctx.previous_results = Arc::new(results);
        ctx
    }

    /// Derive a context with a deadline for one scanner invocation.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.clone();
        ctx.deadline = Some(deadline);
        ctx
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn setting_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.setting(key).unwrap_or(default)
    }

    /// Results of scanners from earlier priority stages, keyed by scanner id.
    pub fn previous_results(&self) -> &BTreeMap<String, ScanResult> {
        &self.previous_results
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the current invocation has run past its deadline.
    pub fn is_expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Find project files matching a glob relative to the root.
    ///
    /// Supports `**`, `*`, `?`, character classes and `{a,b}` alternation.
    /// Results are memoized per pattern and shared by every clone of this
    /// context, so repeated queries return identical sets.
    pub fn find_files(&self, pattern: &str) -> Result<FileSet, ScanError> {
        {
            let cache = self
                .index
                .by_pattern
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(set) = cache.get(pattern) {
                return Ok(set.clone());
            }
        }

        let matcher: GlobMatcher = compile_glob(pattern)?.compile_matcher();
        let entries = self.index.entries()?;
        let set = FileSet::new(
            entries
                .iter()
                .filter(|(rel, _)| matcher.is_match(rel))
                .map(|(_, abs)| abs.clone())
                .collect(),
        );

        let mut cache = self
            .index
            .by_pattern
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(cache.entry(pattern.to_string()).or_insert(set).clone())
    }

    /// Union of [`ScanContext::find_files`] over several patterns.
    pub fn find_files_any(&self, patterns: &[&str]) -> Result<FileSet, ScanError> {
        let mut all = FileSet::default();
        for pattern in patterns {
            all = all.union(&self.find_files(pattern)?);
        }
        Ok(all)
    }

    /// Whether at least one file matches the pattern. Errors count as "no".
    pub fn has_files(&self, pattern: &str) -> bool {
        match self.find_files(pattern) {
            Ok(set) => !set.is_empty(),
            Err(e) => {
                tracing::debug!(pattern, error = %e, "file lookup failed");
                false
            }
        }
    }

    /// Number of indexed project files.
    pub fn total_files(&self) -> Result<usize, ScanError> {
        Ok(self.index.entries()?.len())
    }

    /// Root-relative, forward-slash path for display and ids.
    pub fn relative_path(&self, path: &Path) -> String {
        relative_slash_path(&self.root, path)
    }
}

fn compile_glob(pattern: &str) -> Result<Glob, ScanError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ScanError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
