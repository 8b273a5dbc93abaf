//! Coexisting engine generations.
//!
//! Several build generations of the engine can live in one process; each
//! is addressable by a monotonically increasing ordinal, with the highest
//! acting as "top". A [`Registry`] is an explicit object injected once at
//! process start — callers pass and receive [`Loader`] handles instead of
//! reaching into ambient global state.
//!
//! Creating a new top generation transplants the previous generation's
//! unresolved rules, loaded packages, and namespace bindings through
//! [`Loader::absorb`], and only then publishes the new generation, so no
//! caller ever observes a partially-migrated engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::LoadResult;
use crate::host::PackageHost;
use crate::loader::{Loader, LoaderOptions};

/// Ordered set of coexisting engine generations.
#[derive(Default)]
pub struct Registry {
    generations: BTreeMap<u32, Loader>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            generations: BTreeMap::new(),
        }
    }

    /// Create (or negotiate) the generation for `ordinal`.
    ///
    /// If a generation with an equal or higher ordinal already exists, the
    /// current top is returned: an older bootstrap defers to the newer
    /// engine already in place. Otherwise a fresh loader is built, absorbs
    /// the previous top (or, for the very first generation, seeds its
    /// search path from the environment), and becomes the new top.
    pub fn create(&mut self, ordinal: u32, host: Arc<dyn PackageHost>) -> LoadResult<Loader> {
        self.create_with_options(ordinal, host, LoaderOptions::default())
    }

    pub fn create_with_options(
        &mut self,
        ordinal: u32,
        host: Arc<dyn PackageHost>,
        options: LoaderOptions,
    ) -> LoadResult<Loader> {
        if let Some(top) = self.top() {
            if ordinal <= top.ordinal() {
                debug!(
                    requested = ordinal,
                    top = top.ordinal(),
                    "generation request satisfied by existing top"
                );
                return Ok(top);
            }
        }

        let fresh = Loader::with_options(ordinal, host, options);
        match self.top() {
            Some(previous) => fresh.absorb(&previous)?,
            None => fresh.seed_from_env(),
        }
        self.generations.insert(ordinal, fresh.clone());
        debug!(ordinal, "generation published");
        Ok(fresh)
    }

    /// The generation with exactly this ordinal.
    pub fn get(&self, ordinal: u32) -> Option<Loader> {
        self.generations.get(&ordinal).cloned()
    }

    /// The top generation, provided it satisfies at least `ordinal`: a
    /// caller built against generation N accepts any newer engine.
    pub fn get_compat(&self, ordinal: u32) -> Option<Loader> {
        self.top().filter(|top| ordinal <= top.ordinal())
    }

    /// The most recent generation.
    pub fn top(&self) -> Option<Loader> {
        self.generations
            .last_key_value()
            .map(|(_, loader)| loader.clone())
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("generations", &self.generations.keys().collect::<Vec<_>>())
            .finish()
    }
}
