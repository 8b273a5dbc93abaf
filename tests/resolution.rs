//! Integration tests for package resolution, loading, and activation.
//!
//! These tests verify:
//! - Idempotent loading (code executes exactly once per package)
//! - Highest-version-wins selection within a major key
//! - Search rules firing at most once per epoch, and `reset()` replay
//! - Transitive activation through namespace bindings and boot files
//! - The reloadable escape hatch and the reload gate
//! - Autoload metadata (include files and prefix mappings)

mod common;

use common::{lib_dir, new_loader, populate_lib_dir, Fixture};
use pkgload::manifest::ActivationConfig;

// ============================================================
// Idempotency and version selection
// ============================================================

#[test]
fn test_idempotent_load() {
    let lib = lib_dir(&[Fixture::Source("corelib@1.2.3")]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    let first = loader.load_package("corelib@1", false).unwrap();
    let second = loader.load_package("corelib@1", false).unwrap();

    assert_eq!(first.as_deref(), Some("1.2.3"));
    assert_eq!(second.as_deref(), Some("1.2.3"));
    assert_eq!(host.execution_count("corelib@1.2.3.metta"), 1);
}

#[test]
fn test_highest_version_wins() {
    let lib = lib_dir(&[
        Fixture::Source("corelib@1.0.0"),
        Fixture::Source("corelib@1.2.3"),
        Fixture::Source("corelib@1.6.0"),
    ]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    let version = loader.load_package("corelib@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.6.0"));
    assert_eq!(host.execution_count("corelib@1.6.0.metta"), 1);
    assert_eq!(host.execution_count("corelib@1.0.0.metta"), 0);
    assert_eq!(host.execution_count("corelib@1.2.3.metta"), 0);
}

#[test]
fn test_major_versions_are_distinct_packages() {
    let lib = lib_dir(&[
        Fixture::Source("corelib@1.6.0"),
        Fixture::Source("corelib@2.0.0"),
    ]);
    let (loader, _host) = new_loader();
    loader.add_search_dir(lib.path());

    assert_eq!(
        loader.load_package("corelib@1", false).unwrap().as_deref(),
        Some("1.6.0")
    );
    assert_eq!(
        loader.load_package("corelib@2", false).unwrap().as_deref(),
        Some("2.0.0")
    );
    assert_eq!(loader.loaded_count(), 2);
}

#[test]
fn test_split_search_directories() {
    // Directory A registered first with the older version; B still wins.
    let lib_a = lib_dir(&[Fixture::Source("corelib@1.0.0")]);
    let lib_b = lib_dir(&[Fixture::Source("corelib@1.6.0")]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib_a.path()).add_search_dir(lib_b.path());

    let version = loader.load_package("corelib@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.6.0"));
    assert_eq!(host.execution_count("corelib@1.6.0.metta"), 1);
    assert_eq!(host.execution_count("corelib@1.0.0.metta"), 0);
}

#[test]
fn test_mixed_unit_kinds_compete() {
    // A source file, an archive, and a directory under one major key.
    let lib = lib_dir(&[
        Fixture::Source("corelib@1.0.0"),
        Fixture::Archive("corelib@1.2.0", None),
        Fixture::Dir("corelib@1.4.0", None),
    ]);
    let (loader, _host) = new_loader();
    loader.add_search_dir(lib.path());

    let version = loader.load_package("corelib@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.4.0"));
}

// ============================================================
// Scanner epochs
// ============================================================

#[test]
fn test_rule_fires_once_per_epoch() {
    let lib = lib_dir(&[Fixture::Source("corelib@1.2.3")]);
    let (loader, _host) = new_loader();
    loader.add_search_dir(lib.path());

    loader.load_package("corelib@1", false).unwrap();

    // A package that appears after the rule fired is invisible...
    populate_lib_dir(lib.path(), &[Fixture::Source("latelib@1.0.0")]);
    assert_eq!(loader.load_package("latelib@1", false).unwrap(), None);

    // ...until a reset starts a new epoch.
    loader.reset();
    assert_eq!(
        loader.load_package("latelib@1", false).unwrap().as_deref(),
        Some("1.0.0")
    );
}

// ============================================================
// Transitive activation
// ============================================================

#[test]
fn test_transitive_activation_declarative() {
    // extralib's metadata binds corelib@1 under a prefix the walk has
    // already passed; the fixpoint loop must go around again.
    let lib_a = lib_dir(&[
        Fixture::Source("corelib@1.0.0"),
        Fixture::Source("corelib@1.2.3"),
    ]);
    let lib_b = lib_dir(&[Fixture::Dir(
        "extralib@1.0.0",
        Some(
            r#"
            [[require-namespace]]
            package = "corelib@1"
            prefix = "example:"
            "#,
        ),
    )]);
    let (loader, host) = new_loader();
    loader
        .add_search_dir(lib_a.path())
        .add_search_dir(lib_b.path())
        .add_package("extralib@1", &["example:"]);

    assert_eq!(loader.loaded_count(), 0);
    loader.load_symbol("example:corelib:greet").unwrap();

    assert_eq!(loader.loaded_version("extralib@1"), Some("1.0.0".to_string()));
    assert_eq!(loader.loaded_version("corelib@1"), Some("1.2.3".to_string()));
    assert_eq!(host.execution_count("corelib@1.2.3.metta"), 1);
    assert_eq!(host.execution_count("corelib@1.0.0.metta"), 0);
}

#[test]
fn test_transitive_activation_via_boot_file() {
    let lib = lib_dir(&[
        Fixture::Source("corelib@1.0.0"),
        Fixture::Source("corelib@1.2.3"),
        Fixture::DirWithBoot("extralib@1.0.0"),
    ]);
    let (loader, host) = new_loader();

    // The boot file activates the package itself, then references a
    // symbol that only resolves once corelib is in place.
    let extralib_dir = lib.path().join("extralib@1.0.0");
    let boot_dir = extralib_dir.clone();
    host.script("extralib@1.0.0/pkgload.main.metta", move |loader| {
        let config = ActivationConfig::parse_toml(
            r#"
            [autoload.prefixes]
            "example:" = "src"

            [[require-namespace]]
            package = "corelib@1"
            prefix = "example:"
            "#,
        )
        .map_err(|err| err.to_string())?;
        loader
            .activate_package("extralib@1", Some(&boot_dir), &config)
            .map_err(|err| err.to_string())?;

        loader
            .load_symbol("example:corelib:greet")
            .map_err(|err| err.to_string())?;
        // The dependency must be in place before our own load returns.
        match loader.loaded_version("corelib@1") {
            Some(version) if version == "1.2.3" => Ok(()),
            other => Err(format!("corelib not loaded during boot: {:?}", other)),
        }
    });

    loader.add_search_dir(lib.path());
    let version = loader.load_package("extralib@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.0.0"));

    // Boot ran first, then the transitive dependency.
    let executed = host.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].ends_with("extralib@1.0.0/pkgload.main.metta"));
    assert!(executed[1].ends_with("corelib@1.2.3.metta"));

    // The boot file's prefix mapping was registered.
    let mapped = host.mapped();
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].0, "example:");
    assert_eq!(mapped[0].1, extralib_dir.join("src"));
}

#[test]
fn test_require_package_loads_depth_first() {
    let lib = lib_dir(&[
        Fixture::Source("corelib@1.2.3"),
        Fixture::Archive(
            "extralib@1.0.0",
            Some("require-package = [\"corelib@1\"]\n"),
        ),
    ]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    let version = loader.load_package("extralib@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.0.0"));
    assert_eq!(loader.loaded_version("corelib@1"), Some("1.2.3".to_string()));

    // The archive's entry point runs, then its metadata pulls corelib in
    // before the load returns.
    let executed = host.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].ends_with("extralib@1.0.0.mpkg"));
    assert!(executed[1].ends_with("corelib@1.2.3.metta"));
}

// ============================================================
// Autoload metadata
// ============================================================

#[test]
fn test_autoload_include_and_prefixes() {
    let lib = lib_dir(&[Fixture::Dir(
        "mylib@2.0.0",
        Some(
            r#"
            [autoload]
            include = ["boot/init.metta"]

            [autoload.prefixes]
            "mylib:" = "src"
            "mylib:compat:" = ["compat", "legacy"]
            "#,
        ),
    )]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    loader.load_package("mylib@2", false).unwrap();

    let pkg_dir = lib.path().join("mylib@2.0.0");
    assert_eq!(host.execution_count("init.metta"), 1);

    let mapped = host.mapped();
    assert_eq!(mapped.len(), 3);
    assert!(mapped.contains(&("mylib:".to_string(), pkg_dir.join("src"))));
    assert!(mapped.contains(&("mylib:compat:".to_string(), pkg_dir.join("compat"))));
    assert!(mapped.contains(&("mylib:compat:".to_string(), pkg_dir.join("legacy"))));
}

#[test]
fn test_archive_metadata_read_from_interior() {
    let lib = lib_dir(&[Fixture::Archive(
        "maplib@1.1.0",
        Some(
            r#"
            [autoload.prefixes]
            "maplib:" = "src"
            "#,
        ),
    )]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    loader.load_package("maplib@1", false).unwrap();

    let interior = lib.path().join(".contents").join("maplib@1.1.0");
    let mapped = host.mapped();
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0], ("maplib:".to_string(), interior.join("src")));
}

#[test]
fn test_boot_file_takes_precedence_over_manifest() {
    // A package shipping both a boot file and a declarative document gets
    // only the boot file; the document is not read.
    let lib = lib_dir(&[Fixture::Dir(
        "duallib@1.0.0",
        Some(
            r#"
            [[require-namespace]]
            package = "ghost@1"
            prefix = "ghost:"
            "#,
        ),
    )]);
    std::fs::write(
        lib.path().join("duallib@1.0.0").join(pkgload::BOOT_FILE),
        "; boot source\n",
    )
    .expect("write boot file");

    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());
    loader.load_package("duallib@1", false).unwrap();

    assert_eq!(host.execution_count(pkgload::BOOT_FILE), 1);
    assert!(!loader.has_pending_namespace("ghost:"));
}

// ============================================================
// Reload gate
// ============================================================

#[test]
fn test_reload_gate_rejects_non_reloadable() {
    let lib = lib_dir(&[Fixture::Source("corelib@1.0.0")]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    loader.load_package("corelib@1", false).unwrap();

    // A newer version appears, but this package never opted in.
    populate_lib_dir(lib.path(), &[Fixture::Source("corelib@1.3.0")]);
    let version = loader.load_package("corelib@1", true).unwrap();

    assert_eq!(version.as_deref(), Some("1.0.0"));
    assert_eq!(host.execution_count("corelib@1.0.0.metta"), 1);
    assert_eq!(host.execution_count("corelib@1.3.0.metta"), 0);
}

#[test]
fn test_reload_gate_replaces_reloadable() {
    let manifest = "reloadable = true\n";
    let lib = lib_dir(&[Fixture::Archive("reloadable@1.0.0", Some(manifest))]);
    let (loader, host) = new_loader();
    loader.add_search_dir(lib.path());

    let version = loader.load_package("reloadable@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.0.0"));
    assert!(loader.loaded_package("reloadable@1").unwrap().reloadable);

    // A newer build lands on disk; the forced reload picks it up.
    populate_lib_dir(lib.path(), &[Fixture::Archive("reloadable@1.3.0", Some(manifest))]);
    let version = loader.load_package("reloadable@1", true).unwrap();
    assert_eq!(version.as_deref(), Some("1.3.0"));
    assert!(loader.loaded_package("reloadable@1").unwrap().reloadable);

    assert_eq!(host.execution_count("reloadable@1.0.0.mpkg"), 1);
    assert_eq!(host.execution_count("reloadable@1.3.0.mpkg"), 1);

    // A plain load afterwards sticks with the replacement.
    let version = loader.load_package("reloadable@1", false).unwrap();
    assert_eq!(version.as_deref(), Some("1.3.0"));
    assert_eq!(host.execution_count("reloadable@1.3.0.mpkg"), 1);
}
