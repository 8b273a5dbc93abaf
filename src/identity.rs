//! Package identity: expressions, discovered files, and major keys.
//!
//! A package expression is `name@version` (e.g. `corelib@1.2.3`). The
//! segment before the first `@` is the package name; the segment after is
//! the full version string, whose leading dot-delimited component is the
//! "major" used for the major key (`corelib@1`). Two packages with the
//! same major key are the same logical package at different versions, and
//! the loader tracks them under that single key.

use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};

/// File extension for single-file source packages.
pub const SOURCE_EXT: &str = "metta";

/// File extension for archive packages.
pub const ARCHIVE_EXT: &str = "mpkg";

/// The kind of loadable unit backing a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageKind {
    /// A single source file, executed directly.
    SourceFile,
    /// An archive with an entry point and internal metadata.
    Archive,
    /// A package directory holding metadata and sources.
    Directory,
}

/// Parsed form of a package expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageExpr {
    /// Ex: `corelib@1`
    pub major_key: String,
    /// Ex: `corelib`
    pub name: String,
    /// Ex: `1.2.3`
    pub version: String,
}

/// Split a package expression into its parts.
///
/// Fails with [`LoadError::MalformedPackageName`] when the expression has
/// no `@`; no state is touched in that case. Path separators in the name
/// are normalized to `~` so names derived from paths cannot escape the
/// flat key space.
///
/// ```
/// use pkgload::identity::parse_package;
///
/// let expr = parse_package("corelib@1.2.3").unwrap();
/// assert_eq!(expr.major_key, "corelib@1");
/// assert_eq!(expr.name, "corelib");
/// assert_eq!(expr.version, "1.2.3");
/// ```
pub fn parse_package(expr: &str) -> LoadResult<PackageExpr> {
    let Some((name, version)) = expr.split_once('@') else {
        return Err(LoadError::MalformedPackageName(expr.to_string()));
    };
    let name = name.replace('/', "~");
    let major = version.split('.').next().unwrap_or(version);
    Ok(PackageExpr {
        major_key: format!("{}@{}", name, major),
        name,
        version: version.to_string(),
    })
}

/// A discovered package candidate (and, once resolved, a loaded package).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Package {
    /// Ex: `corelib@1`
    pub major_key: String,
    /// Ex: `corelib`
    pub name: String,
    /// Ex: `1.2.3`
    pub version: String,
    /// Ex: `/usr/share/metta-lib/corelib@1.2.3.mpkg`
    pub file: PathBuf,
    pub kind: PackageKind,
}

impl Package {
    /// Classify a filesystem entry as a loadable unit.
    ///
    /// A `.metta` path is a [`PackageKind::SourceFile`], a `.mpkg` path an
    /// [`PackageKind::Archive`], an existing directory a
    /// [`PackageKind::Directory`]. Anything else is not ours: `Ok(None)`,
    /// to be skipped, not an error. A matching entry whose base name has
    /// no `@` is a hard parse error.
    pub fn from_path(file: &Path) -> LoadResult<Option<Package>> {
        let base_name = match file.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return Ok(None),
        };

        let (base, kind) = if let Some(base) = strip_ext(base_name, SOURCE_EXT) {
            (base, PackageKind::SourceFile)
        } else if let Some(base) = strip_ext(base_name, ARCHIVE_EXT) {
            (base, PackageKind::Archive)
        } else if file.is_dir() {
            (base_name, PackageKind::Directory)
        } else {
            return Ok(None);
        };

        let expr = parse_package(base)?;
        Ok(Some(Package {
            major_key: expr.major_key,
            name: expr.name,
            version: expr.version,
            file: file.to_path_buf(),
            kind,
        }))
    }

    /// Lexical kind detection for explicitly registered items, which must
    /// not touch the filesystem: extension decides, and an extension-less
    /// path is assumed to be a package directory.
    pub fn detect_kind(file: &Path) -> PackageKind {
        match file.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext == SOURCE_EXT => PackageKind::SourceFile,
            Some(ext) if ext == ARCHIVE_EXT => PackageKind::Archive,
            _ => PackageKind::Directory,
        }
    }
}

fn strip_ext<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    let stripped = name.strip_suffix(ext)?;
    stripped.strip_suffix('.')
}
