//! Per-game high scores, bounded to the best N records per game.
//! Persisted as a JSON object keyed by game id.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;

use crate::engine::error::{LauncherError, Result};
use crate::engine::models::{GameId, Ranking, ResultRecord};

pub const DEFAULT_TOP_N: usize = 3;

#[derive(Debug, Clone)]
pub struct ScoreBoard {
    top_n: usize,
    records: IndexMap<GameId, Vec<ResultRecord>>,
    rankings: HashMap<GameId, Ranking>,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl ScoreBoard {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n: top_n.max(1),
            records: IndexMap::new(),
            rankings: HashMap::new(),
        }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Declare how a game's records are ordered. Re-sorts what is already stored.
    pub fn set_ranking(&mut self, game_id: &str, ranking: Ranking) {
        self.rankings.insert(game_id.to_string(), ranking);
        if let Some(list) = self.records.get_mut(game_id) {
            rank_and_truncate(list, ranking, self.top_n);
        }
    }

    /// Ranking declared for `game_id`, if any game or config has declared one.
    pub fn ranking(&self, game_id: &str) -> Option<Ranking> {
        self.rankings.get(game_id).copied()
    }

    /// Add a record using the game's declared ranking, or higher-is-better.
    pub fn add(&mut self, game_id: &str, record: ResultRecord) {
        let ranking = self.ranking(game_id).unwrap_or_default();
        self.add_ranked(game_id, record, ranking);
    }

    pub fn add_ranked(&mut self, game_id: &str, record: ResultRecord, ranking: Ranking) {
        self.rankings.insert(game_id.to_string(), ranking);
        let list = self.records.entry(game_id.to_string()).or_default();
        list.push(record);
        rank_and_truncate(list, ranking, self.top_n);
    }

    pub fn top(&self, game_id: &str) -> &[ResultRecord] {
        self.records.get(game_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snapshot of every game's ranked records, in first-seen order.
    pub fn all(&self) -> IndexMap<GameId, Vec<ResultRecord>> {
        self.records.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the board to `path`. An empty board removes the file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.records.is_empty() {
            return match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(LauncherError::io_at(path, e)),
            };
        }
        let text = serde_json::to_string_pretty(&self.records)
            .map_err(|e| LauncherError::io_at(path, e.into()))?;
        std::fs::write(path, text).map_err(|e| LauncherError::io_at(path, e))?;
        tracing::debug!(path = %path.display(), games = self.records.len(), "saved scores");
        Ok(())
    }

    /// Replace the board's records with the contents of `path`.
    /// A missing file leaves the board empty; an unreadable or corrupt one is logged and ignored.
    /// Lists of games without a declared ranking keep their saved order until one is set.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.records.clear();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read scores file, starting empty");
                return Ok(());
            }
        };
        let parsed: IndexMap<GameId, Vec<ResultRecord>> = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable scores file");
                return Ok(());
            }
        };
        for (game_id, mut list) in parsed {
            if list.is_empty() {
                continue;
            }
            match self.ranking(&game_id) {
                Some(ranking) => rank_and_truncate(&mut list, ranking, self.top_n),
                None => list.truncate(self.top_n),
            }
            self.records.insert(game_id, list);
        }
        tracing::info!(path = %path.display(), games = self.records.len(), "loaded scores");
        Ok(())
    }
}

fn rank_and_truncate(list: &mut Vec<ResultRecord>, ranking: Ranking, top_n: usize) {
    // Stable sort: equal values keep their arrival order.
    list.sort_by(|a, b| ranking.compare(a, b));
    list.truncate(top_n);
}
