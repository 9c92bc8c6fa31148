//! Controller: opens games from the registry, records their results and
//! loads packages on request. Presentation is left to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::engine::config::LauncherConfig;
use crate::engine::error::{ErrorKind, LauncherError, Result};
use crate::engine::loader::{DiscoveryLoader, PackageInfo};
use crate::engine::models::{GameId, Ranking, ResultRecord, UnitInfo};
use crate::engine::plugin::{CompletionListener, SharedUnit};
use crate::engine::registry::{normalize_id, GameRegistry};
use crate::engine::scores::ScoreBoard;
use crate::games::register_builtin_games;

/// Completion listener that files a game's result on the score board.
struct ScoreRecorder {
    game_id: GameId,
    ranking: Ranking,
    scores: Arc<Mutex<ScoreBoard>>,
    scores_path: Option<PathBuf>,
}

impl CompletionListener for ScoreRecorder {
    fn on_finished(&self, record: ResultRecord) {
        tracing::info!(
            game = %self.game_id,
            player = %record.subject_name,
            category = %record.category,
            value = record.value,
            "game finished"
        );
        let mut scores = self.scores.lock();
        scores.add_ranked(&self.game_id, record, self.ranking);
        if let Some(path) = &self.scores_path {
            if let Err(e) = scores.save(path) {
                tracing::error!(path = %path.display(), error = %e, "failed to save scores");
            }
        }
    }
}

pub struct Controller {
    registry: Arc<GameRegistry>,
    loader: DiscoveryLoader,
    scores: Arc<Mutex<ScoreBoard>>,
    scores_path: Option<PathBuf>,
    ranking_overrides: HashMap<GameId, Ranking>,
}

impl Controller {
    /// Controller over an existing loader; scores stay in memory.
    pub fn new(loader: DiscoveryLoader, scores: ScoreBoard) -> Self {
        Self {
            registry: loader.registry().clone(),
            loader,
            scores: Arc::new(Mutex::new(scores)),
            scores_path: None,
            ranking_overrides: HashMap::new(),
        }
    }

    /// Built-in games, the configured packages and the saved scores.
    /// Packages that fail to load are logged and skipped.
    pub fn from_config(config: &LauncherConfig) -> Result<Self> {
        let registry = Arc::new(GameRegistry::new());
        register_builtin_games(&registry)?;

        let mut scores = ScoreBoard::new(config.top_n);
        for (id, ranking) in &config.rankings {
            scores.set_ranking(id, *ranking);
        }
        scores.load(&config.scores_file)?;

        let mut controller = Self::new(DiscoveryLoader::new(registry), scores)
            .with_scores_file(&config.scores_file);
        controller.ranking_overrides = config.rankings.clone();

        for dir in &config.plugin_dirs {
            match controller.load_package(dir) {
                Ok(names) => tracing::info!(package = %dir.display(), games = ?names, "loaded package"),
                Err(e) => tracing::warn!(package = %dir.display(), error = %e, "failed to load package"),
            }
        }
        Ok(controller)
    }

    /// Persist the board to `path` after every finished game.
    pub fn with_scores_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scores_path = Some(path.into());
        self
    }

    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    /// Fetch a game, wire its result into the score board and start a session.
    pub fn open(&self, id: &str, player: Option<&str>) -> Result<SharedUnit> {
        let unit = self.registry.get(id)?;
        let game_id = normalize_id(id)?;
        {
            let mut guard = unit.lock();
            let ranking = self
                .ranking_overrides
                .get(&game_id)
                .copied()
                .unwrap_or_else(|| guard.ranking());
            self.scores.lock().set_ranking(&game_id, ranking);
            guard.set_completion_listener(Arc::new(ScoreRecorder {
                game_id: game_id.clone(),
                ranking,
                scores: self.scores.clone(),
                scores_path: self.scores_path.clone(),
            }));
            if let Some(player) = player {
                guard.set_player_name(player);
            }
            guard.start();
        }
        tracing::info!(game = %game_id, "opened game");
        Ok(unit)
    }

    /// Load a package; blocks on archive I/O.
    pub fn load_package(&self, path: &Path) -> Result<Vec<String>> {
        self.loader.load_from_package(path)
    }

    pub fn loaded_packages(&self) -> Vec<PackageInfo> {
        self.loader.loaded_packages()
    }

    pub fn catalog(&self) -> Vec<UnitInfo> {
        self.registry.list()
    }

    pub fn scores(&self) -> IndexMap<GameId, Vec<ResultRecord>> {
        self.scores.lock().all()
    }

    /// Display names of the games that have been opened or loaded so far.
    pub fn list_loaded_units(&self) -> Vec<String> {
        self.registry
            .materialized()
            .into_iter()
            .map(|(info, _)| info.display_name)
            .collect()
    }

    /// One-line message for showing a failure to the player.
    pub fn notification(error: &LauncherError) -> String {
        match error.kind() {
            ErrorKind::InvalidIdentifier => "Please choose a game.".to_string(),
            ErrorKind::DuplicateIdentifier => format!("That game is already installed ({error})."),
            ErrorKind::NotFound => format!("Game not available: {error}."),
            ErrorKind::InvalidPackage => {
                format!("The selected file is not a valid game package: {error}.")
            }
            ErrorKind::IncompatibleBinary => format!(
                "The package was compiled for a different launcher version and cannot be loaded: {error}."
            ),
            ErrorKind::NoCompatibleUnits => {
                "The selected package did not contain any compatible games.".to_string()
            }
            ErrorKind::InstantiationFailure => format!("The game could not be started: {error}."),
            ErrorKind::Io | ErrorKind::Config => format!("Error: {error}."),
        }
    }
}
