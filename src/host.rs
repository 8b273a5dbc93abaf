//! The seam between the engine and its embedding runtime.
//!
//! Executing a loadable unit's code, mapping a namespace prefix to a
//! concrete source file, and reading inside an archive are all outside
//! this crate: the engine decides *what* must load and *when*, and hands
//! the rest to a [`PackageHost`].

use std::path::{Path, PathBuf};

use crate::loader::Loader;

/// Capabilities the engine requires from its embedding runtime.
///
/// Implementations run with full trust. `execute` is expected to run the
/// unit's code, and that code may call straight back into the [`Loader`]
/// it is handed: requesting further packages, activating itself, or
/// resolving symbols. The loader never holds internal locks across these
/// calls, so re-entry is safe.
pub trait PackageHost {
    /// Execute one loadable unit: a source-file package, an archive entry
    /// point, or an include file named by activation metadata.
    fn execute(&self, loader: &Loader, file: &Path) -> Result<(), String>;

    /// Register a namespace-prefix → base-directory mapping with the
    /// path-mapping loader.
    fn map_prefix(&self, prefix: &str, dir: &Path);

    /// The directory under which an archive's metadata can be read, if
    /// the host can expose one. `None` means the archive's interior is
    /// not inspectable and metadata processing is skipped.
    fn archive_root(&self, archive: &Path) -> Option<PathBuf>;
}

/// A host that does nothing: units "execute" successfully without side
/// effects, no prefixes are recorded, and archives are opaque.
#[derive(Debug, Default)]
pub struct NullHost;

impl PackageHost for NullHost {
    fn execute(&self, _loader: &Loader, _file: &Path) -> Result<(), String> {
        Ok(())
    }

    fn map_prefix(&self, _prefix: &str, _dir: &Path) {}

    fn archive_root(&self, _archive: &Path) -> Option<PathBuf> {
        None
    }
}
