//! The PluggableUnit trait: the interface every game implements, built-in or loaded
//! from a package.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::models::{Ranking, ResultRecord};

/// A unit shared between the registry cache and whoever is currently playing it.
pub type SharedUnit = Arc<Mutex<Box<dyn PluggableUnit>>>;

/// Wrap a concrete unit into the shared form the registry hands out.
pub fn share<U: PluggableUnit + 'static>(unit: U) -> SharedUnit {
    Arc::new(Mutex::new(Box::new(unit)))
}

/// Receives the result of a finished session.
pub trait CompletionListener: Send + Sync {
    fn on_finished(&self, record: ResultRecord);
}

impl<F> CompletionListener for F
where
    F: Fn(ResultRecord) + Send + Sync,
{
    fn on_finished(&self, record: ResultRecord) {
        self(record)
    }
}

/// Trait that every game must implement.
pub trait PluggableUnit: Send {
    /// Begin a new interactive session. Returns immediately.
    fn start(&mut self);

    fn set_completion_listener(&mut self, listener: Arc<dyn CompletionListener>);

    /// Result of the current (or last) session.
    fn current_result(&self) -> ResultRecord;

    /// Direction in which `current_result().value` improves.
    fn ranking(&self) -> Ranking {
        Ranking::HigherIsBetter
    }

    /// Name recorded in `current_result`.
    fn set_player_name(&mut self, _name: &str) {}

    /// Feed one line of player input to the running session.
    fn handle_input(&mut self, _input: &str) {}

    /// Text snapshot of the session for terminal front ends.
    fn render(&self) -> String {
        String::new()
    }

    /// Whether the current session has reached its end.
    fn is_finished(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Completion bookkeeping shared by unit implementations
// ---------------------------------------------------------------------------

/// Holds a unit's listener and fires it at most once per session.
#[derive(Default)]
pub struct CompletionSlot {
    listener: Option<Arc<dyn CompletionListener>>,
    fired: bool,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, listener: Arc<dyn CompletionListener>) {
        self.listener = Some(listener);
    }

    /// Re-arm for a new session.
    pub fn reset(&mut self) {
        self.fired = false;
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Notify the listener unless this session already reported. Returns whether it fired.
    pub fn finish(&mut self, record: ResultRecord) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        if let Some(listener) = &self.listener {
            listener.on_finished(record);
        }
        true
    }
}
