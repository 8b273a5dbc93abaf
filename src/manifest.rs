//! Declarative activation metadata.
//!
//! A directory or archive package may carry a `pkgload.toml` describing
//! how to activate it. The document is parsed once into closed structs;
//! anything malformed fails at parse time, not at use time.
//!
//! ```toml
//! reloadable = true
//!
//! [autoload]
//! include = ["boot/init.metta"]
//!
//! [autoload.prefixes]
//! "corelib:" = "src"
//!
//! [[require-namespace]]
//! prefix = "extra:"
//! package = "extralib@1"
//!
//! require-package = ["corelib@1"]
//! ```
//!
//! A package that prefers code over data ships a `pkgload.main.metta` boot
//! file instead; when present it takes precedence over the document and
//! performs activation itself through direct calls on the loader.

use std::collections::BTreeMap;
use std::path::Path;
use std::slice;

use serde::Deserialize;

use crate::error::{LoadError, LoadResult};

/// Declarative metadata document file name.
pub const MANIFEST_FILE: &str = "pkgload.toml";

/// Boot source file name; executed instead of reading [`MANIFEST_FILE`].
pub const BOOT_FILE: &str = "pkgload.main.metta";

/// One-or-many strings: `"x"` and `["x", "y"]` both deserialize.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.as_slice().iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(value) => slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }
}

/// Path-mapping rules a package registers on activation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoloadConfig {
    /// Files executed unconditionally, relative to the package base dir.
    #[serde(default)]
    pub include: Vec<String>,

    /// Namespace prefix → base directory (or directories) for the
    /// path-mapping loader, relative to the package base dir.
    #[serde(default)]
    pub prefixes: BTreeMap<String, OneOrMany>,
}

/// Declares that symbols under `prefix` require loading `package`.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceRule {
    /// Ex: `corelib@1`
    pub package: OneOrMany,
    /// Ex: `corelib:` (trailing delimiter included)
    pub prefix: OneOrMany,
}

/// Everything a package may declare about its own activation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActivationConfig {
    #[serde(default)]
    pub autoload: Option<AutoloadConfig>,

    /// Namespace hints to merge into the pending set.
    #[serde(default)]
    pub require_namespace: Vec<NamespaceRule>,

    /// Packages to load immediately, depth-first, before activation
    /// returns.
    #[serde(default)]
    pub require_package: Vec<String>,

    /// Marks the loaded record as eligible for forced reloads.
    #[serde(default)]
    pub reloadable: Option<bool>,
}

impl ActivationConfig {
    /// Read `pkgload.toml` from a package base directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist; a file that exists
    /// but fails to parse is a fatal [`LoadError::Manifest`].
    pub fn load(base_dir: &Path) -> LoadResult<Option<Self>> {
        let path = base_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| LoadError::Manifest(path.clone(), err.to_string()))?;
        let config = Self::parse_toml(&content)
            .map_err(|err| LoadError::Manifest(path, err.to_string()))?;
        Ok(Some(config))
    }

    /// Parse an activation document from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Batch registration document for [`crate::Loader::add_all`]: several
/// search directories and package namespace hints in one declarative
/// value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchBundle {
    #[serde(default)]
    pub search_dirs: Vec<String>,

    #[serde(default)]
    pub packages: Vec<PackageHint>,
}

/// One package entry of a [`SearchBundle`].
#[derive(Debug, Clone, Deserialize)]
pub struct PackageHint {
    /// Ex: `corelib@1`
    pub package: String,
    pub prefix: OneOrMany,
}

impl SearchBundle {
    /// Parse a bundle from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
