//! Package discovery over registered search rules.
//!
//! A [`SearchRule`] is either a glob over a directory of versioned
//! packages or an explicit pointer to one known candidate. Rules are
//! stored under a deterministic key so the same rule never occupies two
//! slots, and each rule fires at most once per epoch: filesystem globbing
//! is expensive, and a rule tagged with a specific package name is skipped
//! entirely when scanning for an unrelated hint. [`Scanner::reset`] starts
//! a new epoch by restoring every rule ever added, which lets a later scan
//! re-discover packages that appeared on disk since the previous one.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use globset::Glob;
use tracing::{trace, warn};

use crate::error::LoadResult;
use crate::identity::{Package, PackageKind};

/// A registered locator the scanner may evaluate to discover candidates.
#[derive(Clone, Debug)]
pub enum SearchRule {
    /// List `dir` and keep entries whose file name matches `pattern`.
    Glob {
        /// Package name this rule applies to, or `*` for any.
        hint: String,
        dir: PathBuf,
        pattern: String,
    },
    /// One known candidate, yielded without any filesystem access.
    Explicit {
        hint: String,
        name: String,
        version: String,
        file: PathBuf,
        kind: Option<PackageKind>,
    },
}

impl SearchRule {
    /// Deterministic identity: the glob's textual form, or a hash of the
    /// explicit fields. Adding the same rule twice occupies one slot.
    pub fn key(&self) -> String {
        match self {
            SearchRule::Glob { dir, pattern, .. } => {
                format!("glob:{}/{}", dir.display(), pattern)
            }
            SearchRule::Explicit {
                name,
                version,
                file,
                ..
            } => {
                let mut hasher = DefaultHasher::new();
                name.hash(&mut hasher);
                version.hash(&mut hasher);
                file.hash(&mut hasher);
                format!("item:{:016x}", hasher.finish())
            }
        }
    }

    fn hint(&self) -> &str {
        match self {
            SearchRule::Glob { hint, .. } => hint,
            SearchRule::Explicit { hint, .. } => hint,
        }
    }

    /// A rule applies when its hint is the wildcard or names the sought
    /// package. Hints may be bare names (`corelib`) or major keys
    /// (`corelib@1`); both match a scan for `corelib`.
    fn matches_hint(&self, sought: &str) -> bool {
        let hint = self.hint();
        hint == "*" || hint == sought || hint.split('@').next() == Some(sought)
    }
}

/// Evaluates search rules into package candidates.
///
/// The result of [`Scanner::scan`] is a materialized batch: "fires at most
/// once" is a post-condition of the call, not a side effect of consuming a
/// lazy stream, and callers must assimilate every record in the batch
/// because the backing rules are spent.
pub struct Scanner {
    /// Keys of every rule ever added, in insertion order.
    order: Vec<String>,
    /// Every rule ever added, by key.
    rules: HashMap<String, SearchRule>,
    /// Keys not yet evaluated in the current epoch.
    pending: HashSet<String>,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            rules: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    /// Store a rule under its deterministic key.
    ///
    /// A brand-new key joins the pending set; re-adding an existing key
    /// refreshes the stored rule but does not re-arm one that already
    /// fired this epoch.
    pub fn add_rule(&mut self, rule: SearchRule) {
        let key = rule.key();
        if !self.rules.contains_key(&key) {
            self.order.push(key.clone());
            self.pending.insert(key.clone());
        }
        self.rules.insert(key, rule);
    }

    /// Start a new epoch: every rule ever added becomes pending again.
    pub fn reset(&mut self) {
        self.pending = self.order.iter().cloned().collect();
    }

    /// All rules ever added, in insertion order. Used when a new
    /// generation absorbs this one.
    pub fn rules(&self) -> Vec<SearchRule> {
        self.order.iter().map(|key| self.rules[key].clone()).collect()
    }

    /// Number of rules not yet evaluated this epoch.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Evaluate every pending rule that applies to `hint` and return the
    /// discovered candidates.
    ///
    /// Evaluated rules leave the pending set before they run, so a rule
    /// fires at most once per epoch no matter how many scans follow.
    /// Directory entries that are not loadable units are silently skipped.
    pub fn scan(&mut self, hint: &str) -> LoadResult<Vec<Package>> {
        let mut found = Vec::new();
        for key in self.order.clone() {
            if !self.pending.contains(&key) {
                continue;
            }
            let rule = self.rules[&key].clone();
            if !rule.matches_hint(hint) {
                continue;
            }
            self.pending.remove(&key);

            match rule {
                SearchRule::Glob { dir, pattern, .. } => {
                    scan_glob(&dir, &pattern, &mut found)?;
                }
                SearchRule::Explicit {
                    name,
                    version,
                    file,
                    kind,
                    ..
                } => {
                    let expr = crate::identity::parse_package(&format!("{}@{}", name, version))?;
                    let kind = kind.unwrap_or_else(|| Package::detect_kind(&file));
                    found.push(Package {
                        major_key: expr.major_key,
                        name: expr.name,
                        version: expr.version,
                        file,
                        kind,
                    });
                }
            }
        }
        trace!(hint, count = found.len(), "scan complete");
        Ok(found)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("rule_count", &self.order.len())
            .field("pending_count", &self.pending.len())
            .finish()
    }
}

/// List `dir`, keep entries matching `pattern`, and parse each into a
/// package record. Entries are visited in name order so that discovery is
/// deterministic across platforms.
fn scan_glob(dir: &Path, pattern: &str, out: &mut Vec<Package>) -> LoadResult<()> {
    let matcher = match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher(),
        Err(err) => {
            warn!(pattern, %err, "ignoring unparseable glob rule");
            return Ok(());
        }
    };

    // A missing or unreadable directory yields nothing; the rule is still
    // considered evaluated for this epoch.
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };

    let mut names: Vec<_> = entries
        .flatten()
        .map(|entry| entry.file_name())
        .collect();
    names.sort();

    for name in names {
        if !matcher.is_match(Path::new(&name)) {
            continue;
        }
        if let Some(pkg) = Package::from_path(&dir.join(&name))? {
            trace!(package = %pkg.major_key, version = %pkg.version, "discovered candidate");
            out.push(pkg);
        }
    }
    Ok(())
}
