//! Shared fixture helpers for pkgload integration tests.
//!
//! Tests build small on-disk library directories holding versioned
//! package fixtures, then drive a loader wired to a
//! [`pkgload::testing::RecordingHost`] and assert on what executed.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use pkgload::testing::RecordingHost;
use pkgload::{Loader, LoaderOptions, BOOT_FILE, MANIFEST_FILE};

/// Initialize tracing output once per test binary; silent unless
/// `RUST_LOG` is set.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A loader wired to a fresh recording host, with environment seeding
/// disabled so the surrounding shell can't leak search paths into tests.
pub fn new_loader() -> (Loader, Arc<RecordingHost>) {
    init_logging();
    let host = RecordingHost::new();
    let loader = Loader::with_options(
        1,
        host.clone(),
        LoaderOptions { env_path_var: None },
    );
    (loader, host)
}

/// One package fixture to place in a library directory.
pub enum Fixture<'a> {
    /// `expr.metta` source file.
    Source(&'a str),
    /// `expr/` package directory, optionally holding a `pkgload.toml`.
    Dir(&'a str, Option<&'a str>),
    /// `expr/` package directory holding a `pkgload.main.metta` boot file.
    DirWithBoot(&'a str),
    /// `expr.mpkg` archive; its interior lives at `.contents/expr/` (the
    /// recording host's convention), optionally with a `pkgload.toml`.
    Archive(&'a str, Option<&'a str>),
}

/// Build a library directory holding the given package fixtures.
pub fn lib_dir(fixtures: &[Fixture]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp lib dir");
    populate_lib_dir(dir.path(), fixtures);
    dir
}

/// Write fixtures into an existing directory (for tests that grow a
/// library dir mid-flight).
pub fn populate_lib_dir(base: &Path, fixtures: &[Fixture]) {
    for fixture in fixtures {
        match fixture {
            Fixture::Source(expr) => {
                fs::write(base.join(format!("{expr}.metta")), "; package source\n")
                    .expect("write source fixture");
            }
            Fixture::Dir(expr, manifest) => {
                let pkg_dir = base.join(expr);
                fs::create_dir_all(&pkg_dir).expect("create package dir");
                if let Some(manifest) = manifest {
                    fs::write(pkg_dir.join(MANIFEST_FILE), manifest)
                        .expect("write manifest fixture");
                }
            }
            Fixture::DirWithBoot(expr) => {
                let pkg_dir = base.join(expr);
                fs::create_dir_all(&pkg_dir).expect("create package dir");
                fs::write(pkg_dir.join(BOOT_FILE), "; boot source\n")
                    .expect("write boot fixture");
            }
            Fixture::Archive(expr, manifest) => {
                fs::write(base.join(format!("{expr}.mpkg")), "mpkg\0fixture")
                    .expect("write archive fixture");
                let interior = base.join(".contents").join(expr);
                fs::create_dir_all(&interior).expect("create archive interior");
                if let Some(manifest) = manifest {
                    fs::write(interior.join(MANIFEST_FILE), manifest)
                        .expect("write archive manifest");
                }
            }
        }
    }
}
