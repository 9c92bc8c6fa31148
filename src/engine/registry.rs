//! Registry of available games, keyed by normalized identifier.
//!
//! Built-in games are registered as factories and materialized lazily on first
//! lookup; games loaded from packages are registered with their instance
//! already built. Either way, each id materializes at most one instance and
//! every later `get` returns that same instance.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::engine::error::{panic_message, LauncherError, Result};
use crate::engine::models::{GameId, UnitInfo};
use crate::engine::plugin::{share, PluggableUnit, SharedUnit};

type Factory = Box<dyn Fn() -> SharedUnit + Send + Sync>;

/// How an entry's instance comes to exist.
enum Origin {
    /// Built on first lookup.
    Factory(Factory),
    /// Supplied ready-made at registration.
    Retained,
}

/// One registration: an id bound to a factory or a ready instance.
struct RegistryEntry {
    id: GameId,
    display_name: String,
    external: bool,
    origin: Origin,
    instance: OnceCell<SharedUnit>,
}

impl RegistryEntry {
    fn info(&self) -> UnitInfo {
        UnitInfo {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            external: self.external,
        }
    }

    /// Return the cached instance, running the factory if this is the first lookup.
    /// Concurrent callers block on the cell, so the factory runs once per success.
    fn get_or_create(&self) -> Result<SharedUnit> {
        self.instance
            .get_or_try_init(|| match &self.origin {
                Origin::Factory(factory) => catch_unwind(AssertUnwindSafe(|| factory()))
                    .map_err(|payload| {
                        LauncherError::instantiation(&self.id, panic_message(payload))
                    }),
                Origin::Retained => Err(LauncherError::instantiation(
                    &self.id,
                    "retained entry has no instance",
                )),
            })
            .cloned()
    }
}

/// Trim and lowercase an identifier; empty input is rejected.
pub fn normalize_id(raw: &str) -> Result<GameId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidIdentifier { raw: raw.to_string() });
    }
    Ok(trimmed.to_lowercase())
}

/// Process-wide catalog of games. Construct one and share it by `Arc`.
#[derive(Default)]
pub struct GameRegistry {
    entries: RwLock<IndexMap<GameId, Arc<RegistryEntry>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a built-in game whose instance is built by `constructor` on first lookup.
    pub fn register_builtin<U, F>(&self, id: &str, display_name: &str, constructor: F) -> Result<()>
    where
        U: PluggableUnit + 'static,
        F: Fn() -> U + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move || share(constructor()));
        self.insert(id, display_name, false, Origin::Factory(factory), None)
    }

    /// Declare a game loaded at runtime, backed by an already-built instance.
    pub fn register_external(&self, id: &str, display_name: &str, instance: SharedUnit) -> Result<()> {
        self.insert(id, display_name, true, Origin::Retained, Some(instance))
    }

    fn insert(
        &self,
        id: &str,
        display_name: &str,
        external: bool,
        origin: Origin,
        instance: Option<SharedUnit>,
    ) -> Result<()> {
        let id = normalize_id(id)?;
        let cell = OnceCell::new();
        if let Some(instance) = instance {
            // A fresh cell is always empty.
            let _ = cell.set(instance);
        }
        let entry = Arc::new(RegistryEntry {
            id: id.clone(),
            display_name: display_name.trim().to_string(),
            external,
            origin,
            instance: cell,
        });

        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(LauncherError::DuplicateIdentifier { id });
        }
        entries.insert(id.clone(), entry);
        drop(entries);

        tracing::debug!(id = %id, external, "registered game");
        Ok(())
    }

    /// Look up a game, materializing it on first use.
    pub fn get(&self, id: &str) -> Result<SharedUnit> {
        let id = normalize_id(id)?;
        // Clone the entry out so the map lock is not held while a factory runs.
        let entry = self
            .entries
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| LauncherError::NotFound { id: id.clone() })?;
        entry.get_or_create().inspect_err(|e| {
            tracing::warn!(id = %id, error = %e, "failed to instantiate game");
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        normalize_id(id)
            .map(|id| self.entries.read().contains_key(&id))
            .unwrap_or(false)
    }

    /// Whether `id` already has a materialized instance.
    pub fn is_materialized(&self, id: &str) -> bool {
        let Ok(id) = normalize_id(id) else {
            return false;
        };
        self.entries
            .read()
            .get(&id)
            .is_some_and(|entry| entry.instance.get().is_some())
    }

    /// First unused id among `preferred`, `preferred2`, `preferred3`, ...
    pub fn available_id(&self, preferred: &str) -> Result<GameId> {
        let base = normalize_id(preferred)?;
        let entries = self.entries.read();
        let mut candidate = base.clone();
        let mut suffix = 2u32;
        while entries.contains_key(&candidate) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }

    /// Snapshot of every registration in insertion order.
    pub fn list(&self) -> Vec<UnitInfo> {
        self.entries.read().values().map(|entry| entry.info()).collect()
    }

    pub fn list_ids(&self) -> Vec<GameId> {
        self.entries.read().keys().cloned().collect()
    }

    /// Instances that have already been materialized; factories are not run.
    pub fn instances(&self) -> Vec<SharedUnit> {
        self.entries
            .read()
            .values()
            .filter_map(|entry| entry.instance.get().cloned())
            .collect()
    }

    /// Materialized instances paired with their catalog row.
    pub fn materialized(&self) -> Vec<(UnitInfo, SharedUnit)> {
        self.entries
            .read()
            .values()
            .filter_map(|entry| entry.instance.get().map(|unit| (entry.info(), unit.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::ResultRecord;
    use crate::engine::plugin::CompletionListener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(i64);

    impl PluggableUnit for Counter {
        fn start(&mut self) {
            self.0 += 1;
        }
        fn set_completion_listener(&mut self, _listener: Arc<dyn CompletionListener>) {}
        fn current_result(&self) -> ResultRecord {
            ResultRecord::new("Starts", "test", self.0)
        }
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_id("  SnAke ").unwrap(), "snake");
        assert!(matches!(
            normalize_id(" \t"),
            Err(LauncherError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_get_returns_same_instance() {
        let registry = GameRegistry::new();
        registry.register_builtin("counter", "Counter", || Counter(0)).unwrap();

        let first = registry.get("counter").unwrap();
        first.lock().start();
        let second = registry.get(" COUNTER ").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().current_result().value, 1);
    }

    #[test]
    fn test_factory_runs_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let registry = GameRegistry::new();
        registry
            .register_builtin("counter", "Counter", move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Counter(0)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!registry.is_materialized("counter"));
        assert!(registry.instances().is_empty());

        registry.get("counter").unwrap();
        registry.get("counter").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_materialized("counter"));
        assert_eq!(registry.instances().len(), 1);
    }

    #[test]
    fn test_duplicate_is_rejected_across_origins() {
        let registry = GameRegistry::new();
        registry.register_builtin("Snake", "Snake", || Counter(0)).unwrap();

        let err = registry
            .register_external(" snake", "Other Snake", share(Counter(0)))
            .unwrap_err();
        assert!(matches!(err, LauncherError::DuplicateIdentifier { ref id } if id == "snake"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.list()[0].external);
    }

    #[test]
    fn test_builtin_after_external_is_rejected() {
        let registry = GameRegistry::new();
        let loaded = share(Counter(0));
        registry.register_external("Pong", "Pong", loaded.clone()).unwrap();

        let err = registry
            .register_builtin("PONG ", "Built-in Pong", || Counter(0))
            .unwrap_err();
        assert!(matches!(err, LauncherError::DuplicateIdentifier { ref id } if id == "pong"));
        assert_eq!(registry.len(), 1);
        assert!(registry.list()[0].external);
        assert!(Arc::ptr_eq(&registry.get("pong").unwrap(), &loaded));
    }

    #[test]
    fn test_missing_and_blank_ids() {
        let registry = GameRegistry::new();
        assert!(matches!(
            registry.get("pong"),
            Err(LauncherError::NotFound { .. })
        ));
        assert!(matches!(
            registry.get("   "),
            Err(LauncherError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            registry.register_builtin("", "Nothing", || Counter(0)),
            Err(LauncherError::InvalidIdentifier { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_factory_is_reported_and_retryable() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let registry = GameRegistry::new();
        registry
            .register_builtin("flaky", "Flaky", move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first start fails");
                }
                Counter(0)
            })
            .unwrap();

        let err = registry.get("flaky").err().unwrap();
        assert!(matches!(err, LauncherError::InstantiationFailure { .. }));
        assert!(!registry.is_materialized("flaky"));

        assert!(registry.get("flaky").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_available_id_appends_numeric_suffix() {
        let registry = GameRegistry::new();
        assert_eq!(registry.available_id("Pong").unwrap(), "pong");

        registry.register_external("pong", "Pong", share(Counter(0))).unwrap();
        assert_eq!(registry.available_id("Pong").unwrap(), "pong2");

        registry.register_external("pong2", "Pong", share(Counter(0))).unwrap();
        assert_eq!(registry.available_id("pong").unwrap(), "pong3");
    }

    #[test]
    fn test_list_preserves_insertion_order_and_flags() {
        let registry = GameRegistry::new();
        registry.register_builtin("snake", "Snake", || Counter(0)).unwrap();
        registry.register_external("pong", "Pong", share(Counter(0))).unwrap();
        registry.register_builtin("memory", "Memory Game", || Counter(0)).unwrap();

        let list = registry.list();
        let ids: Vec<&str> = list.iter().map(|info| info.id.as_str()).collect();
        assert_eq!(ids, vec!["snake", "pong", "memory"]);
        assert_eq!(
            list.iter().map(|info| info.external).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        // External instances exist from the moment they are registered.
        assert_eq!(registry.instances().len(), 1);
    }
}
