//! Named, scoped resources shared by steps.
//!
//! Fixtures are declared once on a [`FixtureRegistry`] with a [`Scope`], a
//! list of dependencies and a factory. A [`FixtureResolver`] creates values
//! lazily: session fixtures once per run, scenario fixtures once per
//! scenario. Values are torn down in reverse creation order.

mod cycle;
mod error;

pub use error::{FactoryError, FixtureError};

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::context::ScenarioId;

/// Type-erased fixture value.
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

type Factory = Box<dyn Fn(&FixtureSet) -> anyhow::Result<FixtureValue> + Send + Sync>;

/// Lifetime of a fixture value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Created once and shared by every scenario of a run.
    Session,
    /// Created at most once per scenario and discarded when it ends.
    Scenario,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Scenario => "scenario",
        })
    }
}

/// A declared fixture.
pub struct FixtureDef {
    name: String,
    scope: Scope,
    pub(crate) dependencies: Vec<String>,
    type_name: &'static str,
    factory: Factory,
}

impl FixtureDef {
    /// Fixture name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared scope.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Names of the fixtures the factory receives.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Rust type produced by the factory.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for FixtureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Declared fixtures, keyed by name in declaration order.
#[derive(Debug, Default)]
pub struct FixtureRegistry {
    defs: IndexMap<String, FixtureDef>,
}

impl FixtureRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fixture `name`.
    ///
    /// The factory receives a [`FixtureSet`] holding exactly the fixtures
    /// listed in `dependencies`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Duplicate`] when `name` is already declared.
    pub fn declare<T, F>(
        &mut self,
        name: impl Into<String>,
        scope: Scope,
        dependencies: &[&str],
        factory: F,
    ) -> Result<(), FixtureError>
    where
        T: Any + Send + Sync,
        F: Fn(&FixtureSet) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let key = name.into();
        if self.defs.contains_key(&key) {
            return Err(FixtureError::Duplicate { name: key });
        }
        let def = FixtureDef {
            name: key.clone(),
            scope,
            dependencies: dependencies.iter().map(|dep| (*dep).to_owned()).collect(),
            type_name: type_name::<T>(),
            factory: Box::new(move |deps: &FixtureSet| {
                factory(deps).map(|value| Arc::new(value) as FixtureValue)
            }),
        };
        tracing::debug!(fixture = %key, %scope, "fixture declared");
        self.defs.insert(key, def);
        Ok(())
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Definition of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FixtureDef> {
        self.defs.get(name)
    }

    /// Every definition in declaration order.
    #[must_use]
    pub fn definitions(&self) -> &IndexMap<String, FixtureDef> {
        &self.defs
    }

    /// Check the dependency graph.
    ///
    /// # Errors
    ///
    /// Returns the first undeclared dependency, dependency cycle or scope
    /// mismatch found.
    pub fn validate(&self) -> Result<(), FixtureError> {
        let report = cycle::analyse(&self.defs);
        if let Some((fixture, dependency)) = report.missing_dependencies.into_iter().next() {
            return Err(FixtureError::UnknownDependency {
                fixture,
                dependency,
            });
        }
        if let Some(cycle) = report.cycle {
            return Err(FixtureError::Cycle { cycle });
        }
        for def in self.defs.values() {
            for dep in &def.dependencies {
                if let Some(dep_def) = self.defs.get(dep) {
                    check_scope(def, dep_def)?;
                }
            }
        }
        Ok(())
    }
}

fn check_scope(def: &FixtureDef, dep: &FixtureDef) -> Result<(), FixtureError> {
    if def.scope == Scope::Session && dep.scope == Scope::Scenario {
        return Err(FixtureError::ScopeMismatch {
            fixture: def.name.clone(),
            scope: def.scope,
            dependency: dep.name.clone(),
            dependency_scope: dep.scope,
        });
    }
    Ok(())
}

#[derive(Clone)]
struct Resolved {
    value: FixtureValue,
    type_name: &'static str,
}

/// Fixture values handed to a factory or a step.
///
/// Only the fixtures the requester declared are present; asking for any
/// other name is an error rather than a silent lookup.
pub struct FixtureSet {
    requester: String,
    entries: IndexMap<String, Resolved>,
}

impl FixtureSet {
    /// An empty set for `requester`.
    #[must_use]
    pub fn empty(requester: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            entries: IndexMap::new(),
        }
    }

    /// Borrow fixture `name` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Undeclared`] when the requester did not list
    /// `name`, or [`FixtureError::TypeMismatch`] when the factory produced a
    /// different type.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T, FixtureError> {
        let resolved = self
            .entries
            .get(name)
            .ok_or_else(|| FixtureError::Undeclared {
                requester: self.requester.clone(),
                name: name.to_owned(),
            })?;
        (*resolved.value)
            .downcast_ref::<T>()
            .ok_or_else(|| FixtureError::TypeMismatch {
                name: name.to_owned(),
                actual: resolved.type_name,
                requested: type_name::<T>(),
            })
    }

    /// Names present in the set.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for FixtureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSet")
            .field("requester", &self.requester)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A session factory failure, replayed on later resolves.
#[derive(Debug, Clone)]
struct CachedFailure {
    name: String,
    message: String,
}

impl CachedFailure {
    fn replay(&self) -> FixtureError {
        FixtureError::Setup {
            name: self.name.clone(),
            source: self.message.clone().into(),
        }
    }
}

/// Lazily creates and caches fixture values for one run.
///
/// A session factory that fails is not called again; later resolves get
/// the same setup error. Dropping the resolver tears down every remaining
/// value.
pub struct FixtureResolver<'r> {
    registry: &'r FixtureRegistry,
    session: IndexMap<String, Resolved>,
    session_failures: HashMap<String, CachedFailure>,
    scenarios: HashMap<ScenarioId, IndexMap<String, Resolved>>,
    resolving: Vec<String>,
}

impl<'r> FixtureResolver<'r> {
    /// Create a resolver over `registry` with nothing cached.
    #[must_use]
    pub fn new(registry: &'r FixtureRegistry) -> Self {
        Self {
            registry,
            session: IndexMap::new(),
            session_failures: HashMap::new(),
            scenarios: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Resolve `name` for `scenario`, creating it and its dependencies on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the fixture is unknown, its graph is
    /// cyclic or mis-scoped, or a factory fails.
    pub fn resolve(&mut self, name: &str, scenario: ScenarioId) -> Result<FixtureValue, FixtureError> {
        self.resolve_entry(name, scenario).map(|resolved| resolved.value)
    }

    /// Resolve `name` and downcast it to `T`.
    ///
    /// # Errors
    ///
    /// As [`FixtureResolver::resolve`], plus [`FixtureError::TypeMismatch`].
    pub fn resolve_as<T: Any + Send + Sync>(
        &mut self,
        name: &str,
        scenario: ScenarioId,
    ) -> Result<Arc<T>, FixtureError> {
        let resolved = self.resolve_entry(name, scenario)?;
        resolved
            .value
            .downcast::<T>()
            .map_err(|_| FixtureError::TypeMismatch {
                name: name.to_owned(),
                actual: resolved.type_name,
                requested: type_name::<T>(),
            })
    }

    /// Resolve every name in `names` into a set owned by `requester`.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure.
    pub fn resolve_set<S: AsRef<str>>(
        &mut self,
        requester: &str,
        names: &[S],
        scenario: ScenarioId,
    ) -> Result<FixtureSet, FixtureError> {
        let mut set = FixtureSet::empty(requester);
        for name in names.iter().map(|entry| entry.as_ref()) {
            let resolved = self.resolve_entry(name, scenario)?;
            set.entries.insert(name.to_owned(), resolved);
        }
        Ok(set)
    }

    /// Whether `name` currently holds a live value for `scenario`.
    #[must_use]
    pub fn is_live(&self, name: &str, scenario: ScenarioId) -> bool {
        self.session.contains_key(name)
            || self
                .scenarios
                .get(&scenario)
                .is_some_and(|values| values.contains_key(name))
    }

    /// Number of live session values.
    #[must_use]
    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    /// Discard every scenario value of `scenario`, newest first.
    pub fn teardown_scenario(&mut self, scenario: ScenarioId) {
        if let Some(values) = self.scenarios.remove(&scenario) {
            release(values, Scope::Scenario);
        }
    }

    /// Discard every session value, newest first.
    pub fn teardown_session(&mut self) {
        let ids: Vec<_> = self.scenarios.keys().copied().collect();
        for id in ids {
            tracing::warn!(scenario = %id, "scenario fixtures outlived their scenario");
            self.teardown_scenario(id);
        }
        release(std::mem::take(&mut self.session), Scope::Session);
        self.session_failures.clear();
    }

    /// Forget fixtures whose creation was interrupted by a panic.
    pub(crate) fn clear_in_flight(&mut self) {
        self.resolving.clear();
    }

    fn cached(&self, scope: Scope, name: &str, scenario: ScenarioId) -> Option<&Resolved> {
        match scope {
            Scope::Session => self.session.get(name),
            Scope::Scenario => self.scenarios.get(&scenario)?.get(name),
        }
    }

    fn resolve_entry(&mut self, name: &str, scenario: ScenarioId) -> Result<Resolved, FixtureError> {
        let registry = self.registry;
        let def = registry.get(name).ok_or_else(|| FixtureError::Unknown {
            name: name.to_owned(),
        })?;
        if let Some(resolved) = self.cached(def.scope, name, scenario) {
            return Ok(resolved.clone());
        }
        if let Some(failure) = self.session_failures.get(name) {
            tracing::debug!(fixture = %name, "replaying session setup failure");
            return Err(failure.replay());
        }
        if let Some(pos) = self.resolving.iter().position(|n| n == name) {
            let mut closed: Vec<String> = self.resolving.get(pos..).unwrap_or_default().to_vec();
            closed.push(name.to_owned());
            return Err(FixtureError::Cycle {
                cycle: cycle::canonicalize_cycle(closed),
            });
        }

        self.resolving.push(name.to_owned());
        let created = self.create(def, scenario);
        self.resolving.pop();
        let resolved = match created {
            Ok(resolved) => resolved,
            Err(err) => return Err(self.remember_failure(def, err)),
        };

        tracing::debug!(fixture = %name, scope = %def.scope, %scenario, "fixture created");
        match def.scope {
            Scope::Session => {
                self.session.insert(name.to_owned(), resolved.clone());
            }
            Scope::Scenario => {
                self.scenarios
                    .entry(scenario)
                    .or_default()
                    .insert(name.to_owned(), resolved.clone());
            }
        }
        Ok(resolved)
    }

    fn remember_failure(&mut self, def: &FixtureDef, err: FixtureError) -> FixtureError {
        if def.scope != Scope::Session {
            return err;
        }
        match err {
            FixtureError::Setup { name, source } => {
                let failure = CachedFailure {
                    name,
                    message: source.to_string(),
                };
                let replayed = failure.replay();
                self.session_failures.insert(def.name.clone(), failure);
                replayed
            }
            other => other,
        }
    }

    fn create(&mut self, def: &FixtureDef, scenario: ScenarioId) -> Result<Resolved, FixtureError> {
        let registry = self.registry;
        let mut deps = FixtureSet::empty(def.name.clone());
        for dep in &def.dependencies {
            let dep_def = registry
                .get(dep)
                .ok_or_else(|| FixtureError::UnknownDependency {
                    fixture: def.name.clone(),
                    dependency: dep.clone(),
                })?;
            check_scope(def, dep_def)?;
            let resolved = self.resolve_entry(dep, scenario)?;
            deps.entries.insert(dep.clone(), resolved);
        }
        let value = (def.factory)(&deps).map_err(|source| FixtureError::Setup {
            name: def.name.clone(),
            source: source.into(),
        })?;
        Ok(Resolved {
            value,
            type_name: def.type_name,
        })
    }
}

impl Drop for FixtureResolver<'_> {
    fn drop(&mut self) {
        self.teardown_session();
    }
}

fn release(mut values: IndexMap<String, Resolved>, scope: Scope) {
    while let Some((name, resolved)) = values.pop() {
        drop(resolved);
        tracing::debug!(fixture = %name, %scope, "fixture torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FIRST: ScenarioId = ScenarioId::new(1);
    const SECOND: ScenarioId = ScenarioId::new(2);

    /// Pushes its name to a shared log when dropped.
    struct Tracked {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.lock().expect("log lock").push(self.name);
        }
    }

    #[fixture]
    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting(registry: &mut FixtureRegistry, name: &str, scope: Scope, calls: &Arc<AtomicUsize>) {
        let calls = Arc::clone(calls);
        registry
            .declare(name, scope, &[], move |_| {
                Ok(calls.fetch_add(1, Ordering::SeqCst))
            })
            .expect("declare");
    }

    #[rstest]
    fn session_fixture_is_created_once_per_run(counter: Arc<AtomicUsize>) {
        let mut registry = FixtureRegistry::new();
        counting(&mut registry, "platform", Scope::Session, &counter);
        let mut resolver = FixtureResolver::new(&registry);
        resolver.resolve("platform", FIRST).expect("first");
        resolver.teardown_scenario(FIRST);
        resolver.resolve("platform", SECOND).expect("second");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn scenario_fixture_is_recreated_per_scenario(counter: Arc<AtomicUsize>) {
        let mut registry = FixtureRegistry::new();
        counting(&mut registry, "scratch", Scope::Scenario, &counter);
        let mut resolver = FixtureResolver::new(&registry);
        resolver.resolve("scratch", FIRST).expect("first");
        resolver.resolve("scratch", FIRST).expect("cached");
        resolver.teardown_scenario(FIRST);
        assert!(!resolver.is_live("scratch", FIRST));
        let second = resolver.resolve_as::<usize>("scratch", SECOND).expect("second");
        assert_eq!(*second, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn dependencies_are_resolved_before_dependents() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("base", Scope::Session, &[], |_| Ok(40_i64))
            .expect("base");
        registry
            .declare("derived", Scope::Scenario, &["base"], |deps| {
                Ok(*deps.get::<i64>("base")? + 2)
            })
            .expect("derived");
        let mut resolver = FixtureResolver::new(&registry);
        let value = resolver.resolve_as::<i64>("derived", FIRST).expect("derived");
        assert_eq!(*value, 42);
        assert!(resolver.is_live("base", FIRST));
    }

    #[rstest]
    fn factory_cannot_read_undeclared_fixture() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("base", Scope::Session, &[], |_| Ok(1_i64))
            .expect("base");
        registry
            .declare("sneaky", Scope::Scenario, &[], |deps| {
                Ok(*deps.get::<i64>("base")?)
            })
            .expect("sneaky");
        let mut resolver = FixtureResolver::new(&registry);
        let err = resolver.resolve("sneaky", FIRST).expect_err("undeclared");
        assert!(matches!(err, FixtureError::Setup { ref name, .. } if name == "sneaky"));
        assert!(err.to_string().contains("did not declare"));
    }

    #[rstest]
    fn teardown_runs_in_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = FixtureRegistry::new();
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry
                .declare(name, Scope::Scenario, &[], move |_| {
                    Ok(Tracked {
                        name,
                        log: Arc::clone(&log),
                    })
                })
                .expect("declare");
        }
        let mut resolver = FixtureResolver::new(&registry);
        for name in ["first", "second", "third"] {
            resolver.resolve(name, FIRST).expect("resolve");
        }
        resolver.teardown_scenario(FIRST);
        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["third", "second", "first"]
        );
    }

    #[rstest]
    fn session_values_are_released_when_resolver_drops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = FixtureRegistry::new();
        let factory_log = Arc::clone(&log);
        registry
            .declare("platform", Scope::Session, &[], move |_| {
                Ok(Tracked {
                    name: "platform",
                    log: Arc::clone(&factory_log),
                })
            })
            .expect("declare");
        {
            let mut resolver = FixtureResolver::new(&registry);
            resolver.resolve("platform", FIRST).expect("resolve");
            assert!(log.lock().expect("log lock").is_empty());
        }
        assert_eq!(*log.lock().expect("log lock"), vec!["platform"]);
    }

    #[rstest]
    fn failing_scenario_factory_reports_setup_error_and_is_retried(counter: Arc<AtomicUsize>) {
        let mut registry = FixtureRegistry::new();
        let calls = Arc::clone(&counter);
        registry
            .declare("flaky", Scope::Scenario, &[], move |_| -> anyhow::Result<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("cluster unreachable")
            })
            .expect("declare");
        let mut resolver = FixtureResolver::new(&registry);
        let err = resolver.resolve("flaky", FIRST).expect_err("setup");
        assert_eq!(err.to_string(), "fixture 'flaky' failed to set up: cluster unreachable");
        assert!(resolver.resolve("flaky", FIRST).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn failing_session_factory_is_called_once(counter: Arc<AtomicUsize>) {
        let mut registry = FixtureRegistry::new();
        let calls = Arc::clone(&counter);
        registry
            .declare("platform", Scope::Session, &[], move |_| -> anyhow::Result<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("connection refused")
            })
            .expect("declare");
        registry
            .declare("client", Scope::Session, &["platform"], |_| Ok(()))
            .expect("declare");
        let mut resolver = FixtureResolver::new(&registry);
        let first = resolver.resolve("client", FIRST).expect_err("setup");
        resolver.teardown_scenario(FIRST);
        let second = resolver.resolve("client", SECOND).expect_err("replayed");
        let direct = resolver.resolve("platform", SECOND).expect_err("replayed");
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(
            direct.to_string(),
            "fixture 'platform' failed to set up: connection refused"
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn wrong_type_is_reported() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("name", Scope::Session, &[], |_| Ok(String::from("web")))
            .expect("declare");
        let mut resolver = FixtureResolver::new(&registry);
        let err = resolver.resolve_as::<u32>("name", FIRST).expect_err("mismatch");
        assert!(matches!(err, FixtureError::TypeMismatch { .. }));
    }

    #[rstest]
    fn duplicate_declaration_is_rejected() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("a", Scope::Session, &[], |_| Ok(()))
            .expect("first");
        let err = registry
            .declare("a", Scope::Scenario, &[], |_| Ok(()))
            .expect_err("duplicate");
        assert!(matches!(err, FixtureError::Duplicate { .. }));
    }

    #[rstest]
    fn validate_rejects_session_fixture_depending_on_scenario_fixture() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("scratch", Scope::Scenario, &[], |_| Ok(()))
            .expect("scratch");
        registry
            .declare("platform", Scope::Session, &["scratch"], |_| Ok(()))
            .expect("platform");
        let err = registry.validate().expect_err("scope mismatch");
        assert_eq!(
            err.to_string(),
            "session fixture 'platform' cannot depend on scenario fixture 'scratch'"
        );
    }

    #[rstest]
    fn validate_reports_cycles_and_unknown_dependencies() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("a", Scope::Scenario, &["b"], |_| Ok(()))
            .expect("a");
        registry
            .declare("b", Scope::Scenario, &["a"], |_| Ok(()))
            .expect("b");
        let err = registry.validate().expect_err("cycle");
        assert_eq!(err.to_string(), "fixture dependency cycle: a -> b -> a");

        let mut registry = FixtureRegistry::new();
        registry
            .declare("a", Scope::Scenario, &["ghost"], |_| Ok(()))
            .expect("a");
        assert!(matches!(
            registry.validate(),
            Err(FixtureError::UnknownDependency { .. })
        ));
    }

    #[rstest]
    fn resolve_detects_cycles_without_validation() {
        let mut registry = FixtureRegistry::new();
        registry
            .declare("a", Scope::Scenario, &["b"], |_| Ok(()))
            .expect("a");
        registry
            .declare("b", Scope::Scenario, &["a"], |_| Ok(()))
            .expect("b");
        let mut resolver = FixtureResolver::new(&registry);
        let err = resolver.resolve("b", FIRST).expect_err("cycle");
        assert!(matches!(err, FixtureError::Cycle { ref cycle } if cycle == &["a", "b", "a"]));
    }
}
