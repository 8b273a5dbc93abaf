//! Test support: a scriptable, recording [`PackageHost`].
//!
//! Tests hand the loader a [`RecordingHost`] and later assert on which
//! units executed and which prefixes were mapped. A unit can be given a
//! script — a callback standing in for the unit's code — which runs with
//! the loader handle, so tests can model packages whose code calls back
//! into the engine (self-activation, transitive requires, symbol misses).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::host::PackageHost;
use crate::loader::Loader;

type Script = Arc<dyn Fn(&Loader) -> Result<(), String>>;

/// A [`PackageHost`] that records every interaction.
#[derive(Default)]
pub struct RecordingHost {
    executed: Mutex<Vec<PathBuf>>,
    mapped: Mutex<Vec<(String, PathBuf)>>,
    scripts: Mutex<HashMap<String, Script>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a callback modeling the code of a unit; it runs every time
    /// a file whose path ends with `suffix` executes. A bare file name
    /// (`corelib@1.2.3.metta`) or a longer suffix
    /// (`extralib@1.0.0/pkgload.main.metta`) both work.
    pub fn script(&self, suffix: &str, script: impl Fn(&Loader) -> Result<(), String> + 'static) {
        self.scripts
            .lock()
            .unwrap()
            .insert(suffix.to_string(), Arc::new(script));
    }

    /// Every file executed, in order.
    pub fn executed(&self) -> Vec<PathBuf> {
        self.executed.lock().unwrap().clone()
    }

    /// How many times a unit with this file name was executed.
    pub fn execution_count(&self, file_name: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|file| file.file_name().and_then(|n| n.to_str()) == Some(file_name))
            .count()
    }

    /// Every prefix mapping registered, in order.
    pub fn mapped(&self) -> Vec<(String, PathBuf)> {
        self.mapped.lock().unwrap().clone()
    }
}

impl PackageHost for RecordingHost {
    fn execute(&self, loader: &Loader, file: &Path) -> Result<(), String> {
        self.executed.lock().unwrap().push(file.to_path_buf());

        // Longest matching suffix wins, so a test can script one boot file
        // without catching every package's boot file.
        let script = {
            let scripts = self.scripts.lock().unwrap();
            scripts
                .iter()
                .filter(|(suffix, _)| file.ends_with(Path::new(suffix)))
                .max_by_key(|(suffix, _)| suffix.len())
                .map(|(_, script)| script.clone())
        };
        match script {
            Some(script) => script(loader),
            None => Ok(()),
        }
    }

    fn map_prefix(&self, prefix: &str, dir: &Path) {
        self.mapped
            .lock()
            .unwrap()
            .push((prefix.to_string(), dir.to_path_buf()));
    }

    /// Convention: `lib/pkg@1.2.3.mpkg` exposes its interior under
    /// `lib/.contents/pkg@1.2.3/` (tests lay fixtures out that way; the
    /// hidden directory stays invisible to `*@*` search rules).
    fn archive_root(&self, archive: &Path) -> Option<PathBuf> {
        let stem = archive.file_stem()?;
        Some(archive.parent()?.join(".contents").join(stem))
    }
}

impl std::fmt::Debug for RecordingHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHost")
            .field("executed", &self.executed.lock().unwrap().len())
            .field("mapped", &self.mapped.lock().unwrap().len())
            .finish()
    }
}
