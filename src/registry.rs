//! Static fixture registry and module loaders.
//!
//! `#[fixture]` submits one [`FixtureRegistration`] per fixture type through `inventory`. A [`ModuleLoader`] turns a
//! source name into a [`TestModule`]: the fixtures that live under it, ready for discovery.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::LoadError;
use crate::fixture::FixtureType;

/// Compile-time registration emitted by `#[fixture]`.
pub struct FixtureRegistration {
    module_path: &'static str,
    build: fn() -> FixtureType,
}

impl FixtureRegistration {
    pub const fn new(module_path: &'static str, build: fn() -> FixtureType) -> Self {
        Self { module_path, build }
    }

    /// `module_path!()` of the fixture's declaration.
    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    /// First segment of the module path.
    pub fn crate_name(&self) -> &'static str {
        self.module_path.split("::").next().unwrap_or(self.module_path)
    }

    /// True if this fixture lives in `source` or one of its submodules.
    pub fn is_within(&self, source: &str) -> bool {
        self.module_path == source
            || self
                .module_path
                .strip_prefix(source)
                .is_some_and(|rest| rest.starts_with("::"))
    }

    pub fn build(&self) -> FixtureType {
        (self.build)()
    }
}

inventory::collect!(FixtureRegistration);

/// Fixtures that belong to one source.
#[derive(Debug, Clone)]
pub struct TestModule {
    name: String,
    fixtures: Vec<Arc<FixtureType>>,
}

impl TestModule {
    pub fn new(name: impl Into<String>, fixtures: impl IntoIterator<Item = FixtureType>) -> Self {
        Self {
            name: name.into(),
            fixtures: fixtures.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fixtures(&self) -> &[Arc<FixtureType>] {
        &self.fixtures
    }
}

/// Resolves a source name into its fixtures.
pub trait ModuleLoader {
    fn load(&self, source: &str) -> Result<TestModule, LoadError>;

    /// Every source this loader can serve.
    fn sources(&self) -> Vec<String>;
}

/// Loads fixtures registered with `#[fixture]` in the current binary.
///
/// A source is a crate name or any module path prefix (`calculator_demo`, `my_crate::math`). Fixtures are ordered by
/// type name.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryLoader;

impl InventoryLoader {
    pub fn registrations() -> impl Iterator<Item = &'static FixtureRegistration> {
        inventory::iter::<FixtureRegistration>.into_iter()
    }
}

impl ModuleLoader for InventoryLoader {
    fn load(&self, source: &str) -> Result<TestModule, LoadError> {
        let mut fixtures: Vec<FixtureType> = Self::registrations()
            .filter(|registration| registration.is_within(source))
            .map(FixtureRegistration::build)
            .collect();
        if fixtures.is_empty() {
            return Err(LoadError::NotFound(source.to_string()));
        }
        fixtures.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(TestModule::new(source, fixtures))
    }

    fn sources(&self) -> Vec<String> {
        let names: BTreeSet<&str> = Self::registrations().map(FixtureRegistration::crate_name).collect();
        names.into_iter().map(str::to_string).collect()
    }
}

/// Serves modules built by hand, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    modules: Vec<TestModule>,
    broken: Vec<(String, String)>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: TestModule) -> Self {
        self.modules.push(module);
        self
    }

    /// Register a source whose load always fails with `reason`.
    pub fn with_broken(mut self, source: impl Into<String>, reason: impl Into<String>) -> Self {
        self.broken.push((source.into(), reason.into()));
        self
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, source: &str) -> Result<TestModule, LoadError> {
        if let Some((module, reason)) = self.broken.iter().find(|(name, _)| name == source) {
            return Err(LoadError::Failed {
                module: module.clone(),
                reason: reason.clone(),
            });
        }
        self.modules
            .iter()
            .find(|module| module.name() == source)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(source.to_string()))
    }

    fn sources(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|module| module.name().to_string())
            .chain(self.broken.iter().map(|(name, _)| name.clone()))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixture::FixtureBuilder;

    #[derive(Default)]
    struct Empty;

    fn empty(name: &str) -> FixtureType {
        FixtureBuilder::<Empty>::new(name).build()
    }

    #[test]
    fn test_registration_scoping() {
        let registration = FixtureRegistration::new("demo::math::ops", || empty("demo::math::ops::T"));
        assert_eq!(registration.crate_name(), "demo");
        assert!(registration.is_within("demo"));
        assert!(registration.is_within("demo::math"));
        assert!(registration.is_within("demo::math::ops"));
        assert!(!registration.is_within("demo::mat"));
        assert!(!registration.is_within("other"));
        assert_eq!(registration.build().name(), "demo::math::ops::T");
    }

    #[test]
    fn test_static_loader() {
        let loader = StaticLoader::new()
            .with_module(TestModule::new("alpha", [empty("alpha::A")]))
            .with_broken("beta", "missing symbol");

        assert_eq!(loader.load("alpha").unwrap().fixtures().len(), 1);
        assert_eq!(
            loader.load("beta").unwrap_err(),
            LoadError::Failed {
                module: "beta".to_string(),
                reason: "missing symbol".to_string()
            }
        );
        assert_eq!(loader.load("gamma").unwrap_err(), LoadError::NotFound("gamma".to_string()));
        assert_eq!(loader.sources(), ["alpha", "beta"]);
    }

    #[test]
    fn test_inventory_loader_unknown_source() {
        let err = InventoryLoader.load("no_such_crate_anywhere").unwrap_err();
        assert_eq!(err, LoadError::NotFound("no_such_crate_anywhere".to_string()));
    }
}
