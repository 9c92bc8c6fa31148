//! Registry behavior under the public API: identifier normalization, caching,
//! duplicate rejection and concurrent first lookups.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use minigame_launcher::engine::plugin::share;
use minigame_launcher::games::register_builtin_games;
use minigame_launcher::{
    CompletionListener, ErrorKind, GameRegistry, PluggableUnit, ResultRecord,
};

#[derive(Default)]
struct Tally {
    starts: i64,
}

impl PluggableUnit for Tally {
    fn start(&mut self) {
        self.starts += 1;
    }

    fn set_completion_listener(&mut self, _listener: Arc<dyn CompletionListener>) {}

    fn current_result(&self) -> ResultRecord {
        ResultRecord::new("Starts", "tester", self.starts)
    }
}

#[test]
fn concurrent_first_lookups_build_one_instance() {
    let builds = Arc::new(AtomicUsize::new(0));
    let seen = builds.clone();
    let registry = GameRegistry::new();
    registry
        .register_builtin("tally", "Tally", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Tally::default()
        })
        .unwrap();

    let units: Vec<_> = (0..64)
        .into_par_iter()
        .map(|i| {
            let id = if i % 2 == 0 { "tally" } else { "  TALLY " };
            registry.get(id).unwrap()
        })
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(units.iter().all(|unit| Arc::ptr_eq(unit, &units[0])));
}

#[test]
fn concurrent_registrations_of_one_id_admit_exactly_one() {
    let registry = GameRegistry::new();
    let outcomes: Vec<_> = (0..32)
        .into_par_iter()
        .map(|i| {
            let id = if i % 2 == 0 { "Pong" } else { " pong" };
            registry.register_external(id, "Pong", share(Tally::default()))
        })
        .collect();

    let admitted = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::DuplicateIdentifier));
    assert_eq!(registry.list_ids(), vec!["pong"]);
}

#[test]
fn identifiers_are_case_and_whitespace_insensitive() {
    let registry = GameRegistry::new();
    register_builtin_games(&registry).unwrap();

    let a = registry.get("Snake").unwrap();
    let b = registry.get("\tsnake  ").unwrap();
    let c = registry.get("SNAKE").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));

    let err = registry.get("").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    let err = registry.get("tetris").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn instance_state_survives_between_lookups() {
    let registry = GameRegistry::new();
    registry.register_builtin("tally", "Tally", Tally::default).unwrap();

    registry.get("tally").unwrap().lock().start();
    registry.get("tally").unwrap().lock().start();

    let unit = registry.get("tally").unwrap();
    assert_eq!(unit.lock().current_result().value, 2);
}

#[test]
fn list_and_instances_stay_consistent() {
    let registry = GameRegistry::new();
    register_builtin_games(&registry).unwrap();
    registry
        .register_external("pong", "Pong", share(Tally::default()))
        .unwrap();

    let ids: Vec<String> = registry.list().into_iter().map(|info| info.id).collect();
    assert_eq!(ids, vec!["snake", "simondice", "memory", "pong"]);
    assert_eq!(registry.instances().len(), 1);

    registry.get("memory").unwrap();
    let materialized: Vec<String> = registry
        .materialized()
        .into_iter()
        .map(|(info, _)| info.id)
        .collect();
    assert_eq!(materialized, vec!["memory", "pong"]);

    // Every listed id resolves.
    for id in registry.list_ids() {
        assert!(registry.get(&id).is_ok(), "{id} should resolve");
    }
    assert_eq!(registry.instances().len(), registry.len());
}

#[test]
fn failed_registration_leaves_registry_untouched() {
    let registry = GameRegistry::new();
    register_builtin_games(&registry).unwrap();
    let before = registry.list();

    let err = registry
        .register_builtin(" Memory ", "Another Memory", Tally::default)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateIdentifier);
    let err = registry
        .register_external("  ", "Blank", share(Tally::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

    assert_eq!(registry.list(), before);
    assert!(registry.instances().is_empty());
}
