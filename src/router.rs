//! Namespace-triggered package loading.
//!
//! When the embedding runtime misses a symbol (`corelib:io:read`), the
//! router walks the reference's prefixes from shortest to longest and
//! loads every package bound to a matching prefix. Loading one package can
//! activate metadata that binds prefixes the walk already passed, so the
//! walk repeats until a full pass triggers nothing new.

use tracing::warn;

use crate::error::LoadResult;
use crate::loader::{bind_namespace, Loader};

impl Loader {
    /// Convenience entry point for `:`-delimited symbol references.
    pub fn load_symbol(&self, symbol: &str) -> LoadResult<()> {
        if symbol.contains(':') {
            let parts: Vec<&str> = symbol.split(':').collect();
            self.on_symbol_miss(':', &parts)?;
        }
        Ok(())
    }

    /// Load every package bound to a prefix of the given symbol reference.
    ///
    /// The trailing component is the symbol itself and takes no part in
    /// prefix matching. Each bound package is consumed individually: a
    /// successful load retires the prefix/package pair for good, while a
    /// package that cannot be located is re-queued under its prefix (and
    /// warned about) so a later, better-informed attempt can retry.
    pub fn on_symbol_miss(&self, delim: char, parts: &[&str]) -> LoadResult<()> {
        if parts.len() < 2 {
            return Ok(());
        }
        let stem = &parts[..parts.len() - 1];

        loop {
            let mut found = false;
            let mut prefix = String::new();
            for part in stem {
                prefix.push_str(part);
                prefix.push(delim);

                let bound = {
                    let st = self.state.read().unwrap();
                    st.pending_namespaces.get(&prefix).cloned()
                };
                let Some(bound) = bound else { continue };

                for package in bound {
                    // Consume the binding before loading so a re-entrant
                    // walk does not attempt it again.
                    {
                        let mut st = self.state.write().unwrap();
                        let now_empty = match st.pending_namespaces.get_mut(&prefix) {
                            Some(entry) => {
                                entry.retain(|existing| existing != &package);
                                entry.is_empty()
                            }
                            None => false,
                        };
                        if now_empty {
                            st.pending_namespaces.remove(&prefix);
                        }
                    }
                    if self.load_package(&package, false)?.is_some() {
                        found = true;
                    } else {
                        warn!(
                            package = %package,
                            namespace = %prefix,
                            "failed to locate package required for namespace"
                        );
                        // Maybe some other time.
                        let mut st = self.state.write().unwrap();
                        bind_namespace(&mut st, &prefix, &package);
                    }
                }
            }
            // Loading a package can bind prefixes this pass already walked
            // past; go around again until nothing new triggers.
            if !found {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::host::NullHost;
    use crate::loader::{Loader, LoaderOptions};

    fn loader() -> Loader {
        Loader::with_options(
            1,
            Arc::new(NullHost),
            LoaderOptions { env_path_var: None },
        )
    }

    #[test]
    fn test_prefix_walk_loads_bound_package() {
        let ld = loader();
        ld.add_search_item("corelib", "1.2.3", "/nowhere/corelib@1.2.3.metta", None);
        ld.add_package("corelib@1", &["corelib:"]);

        ld.load_symbol("corelib:io:read").unwrap();
        assert_eq!(ld.loaded_version("corelib@1"), Some("1.2.3".to_string()));
        assert!(!ld.has_pending_namespace("corelib:"));
    }

    #[test]
    fn test_trailing_component_ignored() {
        let ld = loader();
        ld.add_search_item("corelib", "1.2.3", "/nowhere/corelib@1.2.3.metta", None);
        // The binding matches the full reference, which only counts as a
        // symbol, not a namespace.
        ld.add_package("corelib@1", &["corelib:io:read:"]);

        ld.load_symbol("corelib:io:read").unwrap();
        assert_eq!(ld.loaded_count(), 0);
        assert!(ld.has_pending_namespace("corelib:io:read:"));
    }

    #[test]
    fn test_bare_symbol_triggers_nothing() {
        let ld = loader();
        ld.add_package("corelib@1", &["corelib:"]);
        ld.load_symbol("corelib").unwrap();
        assert_eq!(ld.loaded_count(), 0);
    }

    #[test]
    fn test_missing_package_requeued() {
        let ld = loader();
        ld.add_package("ghost@1", &["ghost:"]);

        ld.load_symbol("ghost:thing").unwrap();
        assert_eq!(ld.loaded_count(), 0);
        // Binding survives the failed attempt.
        assert!(ld.has_pending_namespace("ghost:"));

        // Once the package becomes discoverable, the same miss succeeds.
        ld.add_search_item("ghost", "1.0.0", "/nowhere/ghost@1.0.0.metta", None);
        ld.load_symbol("ghost:thing").unwrap();
        assert_eq!(ld.loaded_version("ghost@1"), Some("1.0.0".to_string()));
        assert!(!ld.has_pending_namespace("ghost:"));
    }

    #[test]
    fn test_intermediate_prefixes_all_checked() {
        let ld = loader();
        ld.add_search_item("deep", "2.0.0", "/nowhere/deep@2.0.0.metta", None);
        ld.add_package("deep@2", &["a:b:"]);

        ld.load_symbol("a:b:c:d").unwrap();
        assert_eq!(ld.loaded_version("deep@2"), Some("2.0.0".to_string()));
    }
}
