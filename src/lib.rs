//! pkgload - Lazy package resolution and activation
//!
//! This library resolves versioned MeTTa library packages on demand: given
//! a set of search locations and declared "namespace → package" hints, it
//! discovers available packages, selects the highest version within a
//! major key, loads each selected package's code exactly once, and
//! recursively processes package metadata that may bind further namespaces
//! or force-load further packages.
//!
//! # Architecture
//!
//! - [`identity`] - package expressions (`name@version`), major keys, and
//!   loadable-unit classification (`.metta` file, `.mpkg` archive, or
//!   package directory)
//! - [`scanner`] - search rules (globs and explicit items), evaluated at
//!   most once per epoch
//! - [`loader`] - the engine: lazy resolve, highest-version-wins merge,
//!   idempotent loading, the reloadable escape hatch, and activation
//! - [`manifest`] - the declarative `pkgload.toml` activation document
//! - [`registry`] - coexisting engine generations with explicit state
//!   transplant on upgrade
//! - [`host`] - the [`PackageHost`] seam to the embedding runtime, which
//!   executes units and maps namespace prefixes to source files
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pkgload::{Loader, LoaderOptions, NullHost};
//!
//! let loader = Loader::with_options(
//!     1,
//!     Arc::new(NullHost),
//!     LoaderOptions { env_path_var: None },
//! );
//!
//! // Register a candidate and a namespace hint.
//! loader
//!     .add_search_item("corelib", "1.2.3", "/lib/corelib@1.2.3.metta", None)
//!     .add_package("corelib@1", &["corelib:"]);
//!
//! // A missed symbol under the hinted namespace triggers the load.
//! loader.load_symbol("corelib:io:read").unwrap();
//! assert_eq!(loader.loaded_version("corelib@1"), Some("1.2.3".into()));
//!
//! // Loading again is a no-op returning the cached version.
//! let again = loader.load_package("corelib@1", false).unwrap();
//! assert_eq!(again.as_deref(), Some("1.2.3"));
//! ```

pub mod error;
pub mod host;
pub mod identity;
pub mod loader;
pub mod manifest;
pub mod registry;
mod router;
pub mod scanner;
pub mod testing;
pub mod version;

pub use error::{LoadError, LoadResult};
pub use host::{NullHost, PackageHost};
pub use identity::{parse_package, Package, PackageExpr, PackageKind};
pub use loader::{LoadedPackage, Loader, LoaderOptions, ENV_PATH_VAR};
pub use manifest::{
    ActivationConfig, AutoloadConfig, NamespaceRule, OneOrMany, PackageHint, SearchBundle,
    BOOT_FILE, MANIFEST_FILE,
};
pub use registry::Registry;
pub use scanner::{Scanner, SearchRule};
pub use version::compare_versions;
