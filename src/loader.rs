//! The resolution-and-activation engine.
//!
//! A [`Loader`] owns one generation's worth of resolution state: the
//! search rules (via its [`Scanner`]), the best-known-but-not-yet-loaded
//! candidates, the loaded packages, and the pending namespace bindings.
//! Packages are resolved lazily: nothing is scanned until something asks
//! for a package, and each search rule fires at most once per epoch.
//!
//! # Idempotency and re-entrancy
//!
//! A package is moved into the loaded map *before* its code runs, so a
//! unit that recursively requests itself (directly or through a namespace
//! miss) gets the cached answer instead of a second execution. No internal
//! lock is held across a host callback, so package code is free to call
//! back into the loader that is currently loading it.
//!
//! # Handles
//!
//! `Loader` is a cheap clone sharing one state allocation, so the host and
//! the caller can both hold it. Cross-generation upgrades transplant state
//! with [`Loader::absorb`]; see [`crate::registry::Registry`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, trace, warn};

use crate::error::{LoadError, LoadResult};
use crate::host::PackageHost;
use crate::identity::{parse_package, Package, PackageExpr, PackageKind};
use crate::manifest::{ActivationConfig, SearchBundle, BOOT_FILE};
use crate::scanner::{Scanner, SearchRule};
use crate::version::is_newer;

/// Default environment variable naming the initial search path.
pub const ENV_PATH_VAR: &str = "PKGLOAD_PATH";

/// Loader construction options.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Environment variable consulted for initial search directories when
    /// a generation is created with no predecessor to absorb. `None`
    /// disables environment seeding.
    pub env_path_var: Option<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            env_path_var: Some(ENV_PATH_VAR.to_string()),
        }
    }
}

/// A package that has been resolved and executed.
#[derive(Clone, Debug)]
pub struct LoadedPackage {
    pub package: Package,
    /// Set through activation metadata; gates forced reloads.
    pub reloadable: bool,
}

/// One recorded activation, kept so a newer generation can re-register
/// path mappings and namespace declarations against its own host.
#[derive(Clone, Debug)]
pub(crate) struct ActivationRecord {
    pkg: String,
    base_dir: Option<PathBuf>,
    config: ActivationConfig,
}

pub(crate) struct LoaderState {
    ordinal: u32,
    pub(crate) scanner: Scanner,
    /// Candidates discovered but not yet loaded, best version per major
    /// key. Never holds a key that is also in `loaded`.
    available: HashMap<String, Package>,
    /// Terminal: once a major key lands here it is only replaced through
    /// the reloadable escape hatch.
    loaded: HashMap<String, LoadedPackage>,
    /// Namespace prefix → packages that must load before the prefix can
    /// resolve. Consumed by the router; failed loads are re-queued.
    pub(crate) pending_namespaces: HashMap<String, Vec<String>>,
    activation_log: Vec<ActivationRecord>,
    /// Major keys whose activation has been applied; activation is never
    /// re-entered for these.
    activated: HashSet<String>,
}

/// Append a namespace binding, keeping the per-prefix package list free of
/// duplicates.
pub(crate) fn bind_namespace(state: &mut LoaderState, prefix: &str, package: &str) {
    let entry = state.pending_namespaces.entry(prefix.to_string()).or_default();
    if !entry.iter().any(|existing| existing == package) {
        entry.push(package.to_string());
    }
}

/// The resolution-and-activation engine for one generation.
#[derive(Clone)]
pub struct Loader {
    pub(crate) state: Arc<RwLock<LoaderState>>,
    pub(crate) host: Arc<dyn PackageHost>,
    options: Arc<LoaderOptions>,
}

impl Loader {
    pub fn new(ordinal: u32, host: Arc<dyn PackageHost>) -> Self {
        Self::with_options(ordinal, host, LoaderOptions::default())
    }

    pub fn with_options(ordinal: u32, host: Arc<dyn PackageHost>, options: LoaderOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(LoaderState {
                ordinal,
                scanner: Scanner::new(),
                available: HashMap::new(),
                loaded: HashMap::new(),
                pending_namespaces: HashMap::new(),
                activation_log: Vec::new(),
                activated: HashSet::new(),
            })),
            host,
            options: Arc::new(options),
        }
    }

    /// This generation's ordinal.
    pub fn ordinal(&self) -> u32 {
        self.state.read().unwrap().ordinal
    }

    pub fn host(&self) -> &Arc<dyn PackageHost> {
        &self.host
    }

    // ------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------

    /// Append a directory of versioned packages to the search path. The
    /// directory is expected to contain entries named `name@version.metta`,
    /// `name@version.mpkg`, or `name@version/`.
    pub fn add_search_dir(&self, base_dir: impl Into<PathBuf>) -> &Self {
        let rule = SearchRule::Glob {
            hint: "*".to_string(),
            dir: base_dir.into(),
            pattern: "*@*".to_string(),
        };
        self.state.write().unwrap().scanner.add_rule(rule);
        self
    }

    /// Register one specific candidate, bypassing filesystem scanning.
    /// `kind` is detected from the file name when omitted.
    pub fn add_search_item(
        &self,
        name: &str,
        version: &str,
        file: impl Into<PathBuf>,
        kind: Option<PackageKind>,
    ) -> &Self {
        let rule = SearchRule::Explicit {
            hint: name.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            file: file.into(),
            kind,
        };
        self.state.write().unwrap().scanner.add_rule(rule);
        self
    }

    /// Declare that symbols under the given prefix(es) require loading
    /// `pkg`. Prefixes include their trailing delimiter (`corelib:`).
    pub fn add_package(&self, pkg: &str, prefixes: &[&str]) -> &Self {
        let mut st = self.state.write().unwrap();
        for prefix in prefixes {
            bind_namespace(&mut st, prefix, pkg);
        }
        self
    }

    /// Batch registration: search directories and namespace hints from one
    /// declarative bundle. Relative directories are anchored at
    /// `base_dir` when given.
    pub fn add_all(&self, bundle: &SearchBundle, base_dir: Option<&Path>) -> &Self {
        for dir in &bundle.search_dirs {
            self.add_search_dir(anchor(dir, base_dir));
        }
        for hint in &bundle.packages {
            let prefixes: Vec<&str> = hint.prefix.iter().collect();
            self.add_package(&hint.package, &prefixes);
        }
        self
    }

    /// Start a new scanner epoch: every search rule ever added becomes
    /// eligible to fire again, picking up packages that appeared on disk
    /// since the last scan.
    pub fn reset(&self) -> &Self {
        self.state.write().unwrap().scanner.reset();
        self
    }

    // ------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------

    /// Resolve a package to its best known record, loading-state wise:
    /// an already-loaded package returns its record; otherwise applicable
    /// search rules are evaluated, the highest version per major key is
    /// kept, and the winner (if any) moves to the loaded map.
    ///
    /// `Ok(None)` means "not found right now" — recoverable, logged, and
    /// retried freely later.
    pub fn resolve(&self, pkg: &str) -> LoadResult<Option<Package>> {
        let expr = parse_package(pkg)?;
        if let Some(loaded) = self.state.read().unwrap().loaded.get(&expr.major_key) {
            return Ok(Some(loaded.package.clone()));
        }
        self.resolve_fresh(&expr, false)
    }

    /// Scan, merge, and claim the winning candidate for `expr`. The move
    /// into the loaded map happens here, before any code execution.
    fn resolve_fresh(&self, expr: &PackageExpr, replacing: bool) -> LoadResult<Option<Package>> {
        let mut st = self.state.write().unwrap();
        let batch = st.scanner.scan(&expr.name)?;
        for candidate in batch {
            // Candidates for already-loaded majors are dropped so a major
            // key never sits in both maps; the one exception is the major
            // being force-reloaded.
            if st.loaded.contains_key(&candidate.major_key)
                && !(replacing && candidate.major_key == expr.major_key)
            {
                trace!(package = %candidate.major_key, "candidate already loaded, skipping");
                continue;
            }
            let keep = match st.available.get(&candidate.major_key) {
                Some(incumbent) => is_newer(&candidate.version, &incumbent.version),
                None => true,
            };
            if keep {
                st.available.insert(candidate.major_key.clone(), candidate);
            }
        }

        let Some(winner) = st.available.remove(&expr.major_key) else {
            warn!(package = %expr.major_key, "failed to locate package");
            return Ok(None);
        };
        debug!(
            package = %winner.major_key,
            version = %winner.version,
            file = %winner.file.display(),
            "package selected"
        );
        st.loaded.insert(
            expr.major_key.clone(),
            LoadedPackage {
                package: winner.clone(),
                reloadable: false,
            },
        );
        // A fresh unit means fresh metadata; let its activation run.
        st.activated.remove(&expr.major_key);
        Ok(Some(winner))
    }

    // ------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------

    /// Load the content of a package.
    ///
    /// Loading an already-loaded package is a no-op returning the cached
    /// version. With `reload`, a package marked reloadable gets a fresh
    /// scanner epoch and the new winner (if any) replaces it; a package
    /// not marked reloadable rejects the attempt and returns the cached
    /// version without rescanning.
    ///
    /// `Ok(None)` means the package could not be located (logged, not
    /// fatal).
    pub fn load_package(&self, pkg: &str, reload: bool) -> LoadResult<Option<String>> {
        let expr = parse_package(pkg)?;

        let mut replacing = false;
        {
            let mut st = self.state.write().unwrap();
            if let Some(loaded) = st.loaded.get(&expr.major_key) {
                if reload && loaded.reloadable {
                    debug!(package = %expr.major_key, "force reload: starting fresh scanner epoch");
                    st.scanner.reset();
                    replacing = true;
                } else {
                    if reload {
                        debug!(package = %expr.major_key, "reload rejected: package not reloadable");
                    }
                    return Ok(Some(loaded.package.version.clone()));
                }
            }
        }

        let Some(package) = self.resolve_fresh(&expr, replacing)? else {
            return Ok(None);
        };

        match package.kind {
            PackageKind::SourceFile => {
                self.execute_unit(&package.file)?;
            }
            PackageKind::Archive => {
                self.execute_unit(&package.file)?;
                match self.host.archive_root(&package.file) {
                    Some(root) => self.use_metadata(&expr.major_key, &root)?,
                    None => {
                        debug!(
                            package = %expr.major_key,
                            "archive interior not inspectable; skipping metadata"
                        );
                    }
                }
            }
            PackageKind::Directory => {
                self.use_metadata(&expr.major_key, &package.file)?;
            }
        }

        Ok(Some(package.version))
    }

    fn execute_unit(&self, file: &Path) -> LoadResult<()> {
        trace!(file = %file.display(), "executing unit");
        self.host
            .execute(self, file)
            .map_err(|err| LoadError::Exec(file.to_path_buf(), err))
    }

    /// Process a loaded package's metadata: a boot source file is executed
    /// if present (it activates through direct calls); otherwise a
    /// declarative document is parsed and applied.
    fn use_metadata(&self, major_key: &str, base_dir: &Path) -> LoadResult<()> {
        let boot = base_dir.join(BOOT_FILE);
        if boot.exists() {
            return self.execute_unit(&boot);
        }
        if let Some(config) = ActivationConfig::load(base_dir)? {
            self.activate_package(major_key, Some(base_dir), &config)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------

    /// Apply a package's activation config: register path-mapping rules,
    /// declare namespace bindings, and load required packages depth-first.
    /// Packages shipping as a single unit call this directly from their
    /// boot code.
    ///
    /// Declaring `autoload` with no base directory is a contract violation
    /// and fails loudly. Activation is applied at most once per package.
    pub fn activate_package(
        &self,
        pkg: &str,
        base_dir: Option<&Path>,
        config: &ActivationConfig,
    ) -> LoadResult<()> {
        self.apply_activation(pkg, base_dir, config, false)
    }

    fn apply_activation(
        &self,
        pkg: &str,
        base_dir: Option<&Path>,
        config: &ActivationConfig,
        replay: bool,
    ) -> LoadResult<()> {
        let expr = parse_package(pkg)?;

        let autoload = match (&config.autoload, base_dir) {
            (Some(_), None) => {
                return Err(LoadError::ActivationContract(format!(
                    "cannot activate package {}: autoload rules require a base directory",
                    expr.major_key
                )));
            }
            (Some(autoload), Some(dir)) => Some((autoload, dir)),
            (None, _) => None,
        };

        {
            let mut st = self.state.write().unwrap();
            if st.activated.contains(&expr.major_key) {
                debug!(package = %expr.major_key, "activation already applied");
                return Ok(());
            }
            st.activated.insert(expr.major_key.clone());

            if let Some(reloadable) = config.reloadable {
                if let Some(loaded) = st.loaded.get_mut(&expr.major_key) {
                    loaded.reloadable = reloadable;
                }
            }

            st.activation_log.push(ActivationRecord {
                pkg: pkg.to_string(),
                base_dir: base_dir.map(Path::to_path_buf),
                config: config.clone(),
            });
        }

        if let Some((autoload, dir)) = autoload {
            if !replay {
                for file in &autoload.include {
                    self.execute_unit(&dir.join(file))?;
                }
            }
            for (prefix, paths) in &autoload.prefixes {
                for rel in paths.iter() {
                    self.host.map_prefix(prefix, &dir.join(rel));
                }
            }
        }

        {
            let mut st = self.state.write().unwrap();
            for rule in &config.require_namespace {
                for prefix in rule.prefix.iter() {
                    for package in rule.package.iter() {
                        bind_namespace(&mut st, prefix, package);
                    }
                }
            }
        }

        if !replay {
            for package in &config.require_package {
                self.load_package(package, false)?;
            }
        }

        debug!(package = %expr.major_key, replay, "package activated");
        Ok(())
    }

    // ------------------------------------------------------------
    // Generation transplant
    // ------------------------------------------------------------

    /// Absorb a predecessor generation's state: its full rule history
    /// (re-armed as pending), its loaded packages (carried as-is, never
    /// re-executed), its pending namespace bindings, and its activation
    /// log. Replayed activations re-register prefix mappings and
    /// namespace/reloadable declarations against this generation's host;
    /// include files and require-package loads are not re-executed.
    pub fn absorb(&self, old: &Loader) -> LoadResult<()> {
        let (rules, loaded, pending, log) = {
            let st = old.state.read().unwrap();
            (
                st.scanner.rules(),
                st.loaded.clone(),
                st.pending_namespaces.clone(),
                st.activation_log.clone(),
            )
        };
        debug!(
            from = old.ordinal(),
            to = self.ordinal(),
            rules = rules.len(),
            loaded = loaded.len(),
            "absorbing previous generation"
        );

        {
            let mut st = self.state.write().unwrap();
            for rule in rules {
                st.scanner.add_rule(rule);
            }
            st.loaded.extend(loaded);
            for (prefix, packages) in pending {
                for package in packages {
                    bind_namespace(&mut st, &prefix, &package);
                }
            }
        }

        for record in log {
            self.apply_activation(&record.pkg, record.base_dir.as_deref(), &record.config, true)?;
        }
        Ok(())
    }

    /// Seed initial search directories from the configured environment
    /// variable (`:`-separated paths). Used when a generation starts with
    /// no predecessor.
    pub(crate) fn seed_from_env(&self) {
        let Some(var) = &self.options.env_path_var else {
            return;
        };
        let Ok(value) = std::env::var(var) else {
            return;
        };
        for dir in std::env::split_paths(&value) {
            if !dir.as_os_str().is_empty() {
                self.add_search_dir(dir);
            }
        }
    }

    // ------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------

    /// The loaded record for a major key, if any.
    pub fn loaded_package(&self, major_key: &str) -> Option<LoadedPackage> {
        self.state.read().unwrap().loaded.get(major_key).cloned()
    }

    /// The loaded version for a major key, if any.
    pub fn loaded_version(&self, major_key: &str) -> Option<String> {
        self.loaded_package(major_key)
            .map(|loaded| loaded.package.version)
    }

    pub fn loaded_count(&self) -> usize {
        self.state.read().unwrap().loaded.len()
    }

    /// True if the prefix still has unconsumed namespace bindings.
    pub fn has_pending_namespace(&self, prefix: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .pending_namespaces
            .get(prefix)
            .is_some_and(|packages| !packages.is_empty())
    }

    /// Number of search rules not yet evaluated this epoch.
    pub fn pending_rule_count(&self) -> usize {
        self.state.read().unwrap().scanner.pending_count()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.read().unwrap();
        f.debug_struct("Loader")
            .field("ordinal", &st.ordinal)
            .field("loaded", &st.loaded.len())
            .field("available", &st.available.len())
            .field("pending_namespaces", &st.pending_namespaces.len())
            .finish()
    }
}

fn anchor(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(path);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
