//! Mini-game launcher: a catalog of built-in games that can be extended at
//! runtime with games shipped as external packages.

pub mod engine;
pub mod games;

pub use engine::error::{ErrorKind, LauncherError, Result};
pub use engine::models::{Ranking, ResultRecord, UnitInfo};
pub use engine::module::UnitDeclaration;
pub use engine::plugin::{CompletionListener, CompletionSlot, PluggableUnit, SharedUnit};
pub use engine::registry::GameRegistry;
