//! Memory: flip cards two at a time until every pair is found.
//! Score is the number of attempts, so fewer is better.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::models::{Ranking, ResultRecord};
use crate::engine::plugin::{CompletionListener, CompletionSlot, PluggableUnit};

pub const CATEGORY: &str = "Intentos";
const DEFAULT_PAIRS: usize = 8;
const SYMBOLS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipOutcome {
    /// First card of an attempt turned up.
    Revealed,
    Matched,
    Mismatched,
    /// Out of range, already matched, or the same card twice.
    Ignored,
}

pub struct MemoryGame {
    pairs: usize,
    cards: Vec<u8>,
    matched: Vec<bool>,
    /// First card of the attempt in progress.
    pending: Option<usize>,
    /// Last mismatched pair, shown until the next flip.
    shown: Option<(usize, usize)>,
    attempts: i64,
    running: bool,
    started: bool,
    player: String,
    rng: StdRng,
    completion: CompletionSlot,
}

impl Default for MemoryGame {
    fn default() -> Self {
        Self::new(DEFAULT_PAIRS, StdRng::from_entropy())
    }
}

impl MemoryGame {
    pub fn new(pairs: usize, rng: StdRng) -> Self {
        Self {
            pairs: pairs.clamp(1, SYMBOLS.len()),
            cards: Vec::new(),
            matched: Vec::new(),
            pending: None,
            shown: None,
            attempts: 0,
            running: false,
            started: false,
            player: "Player".into(),
            rng,
            completion: CompletionSlot::new(),
        }
    }

    pub fn with_seed(pairs: usize, seed: u64) -> Self {
        Self::new(pairs, StdRng::seed_from_u64(seed))
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Face of the card at `index`, regardless of whether it is turned up.
    pub fn peek(&self, index: usize) -> Option<char> {
        self.cards.get(index).map(|&c| c as char)
    }

    pub fn flip(&mut self, index: usize) -> FlipOutcome {
        if !self.running || index >= self.cards.len() || self.matched[index] {
            return FlipOutcome::Ignored;
        }
        self.shown = None;
        let Some(first) = self.pending.take() else {
            self.pending = Some(index);
            return FlipOutcome::Revealed;
        };
        if first == index {
            self.pending = Some(first);
            return FlipOutcome::Ignored;
        }

        self.attempts += 1;
        if self.cards[first] != self.cards[index] {
            self.shown = Some((first, index));
            return FlipOutcome::Mismatched;
        }
        self.matched[first] = true;
        self.matched[index] = true;
        if self.matched.iter().all(|&m| m) {
            self.running = false;
            let record = self.current_result();
            self.completion.finish(record);
        }
        FlipOutcome::Matched
    }

    fn face_up(&self, index: usize) -> bool {
        self.matched[index]
            || self.pending == Some(index)
            || self.shown.is_some_and(|(a, b)| a == index || b == index)
    }
}

impl PluggableUnit for MemoryGame {
    fn start(&mut self) {
        self.cards = SYMBOLS[..self.pairs]
            .iter()
            .flat_map(|&s| [s, s])
            .collect();
        self.cards.shuffle(&mut self.rng);
        self.matched = vec![false; self.cards.len()];
        self.pending = None;
        self.shown = None;
        self.attempts = 0;
        self.running = true;
        self.started = true;
        self.completion.reset();
    }

    fn set_completion_listener(&mut self, listener: Arc<dyn CompletionListener>) {
        self.completion.set(listener);
    }

    fn current_result(&self) -> ResultRecord {
        ResultRecord::new(CATEGORY, &self.player, self.attempts)
    }

    fn ranking(&self) -> Ranking {
        Ranking::LowerIsBetter
    }

    fn set_player_name(&mut self, name: &str) {
        if !name.trim().is_empty() {
            self.player = name.trim().to_string();
        }
    }

    fn handle_input(&mut self, input: &str) {
        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            self.running = false;
            return;
        }
        for token in input.split_whitespace() {
            match token.parse::<usize>() {
                Ok(index) => {
                    self.flip(index);
                }
                Err(_) => tracing::debug!(token, "ignoring non-numeric card"),
            }
        }
    }

    fn render(&self) -> String {
        let columns = (self.cards.len() as f64).sqrt().ceil().max(1.0) as usize;
        let mut out = String::new();
        for (index, &card) in self.cards.iter().enumerate() {
            if self.face_up(index) {
                out.push_str(&format!("[{:>2} {}] ", index, card as char));
            } else {
                out.push_str(&format!("[{:>2} ?] ", index));
            }
            if (index + 1) % columns == 0 {
                out.push('\n');
            }
        }
        out.push_str(&format!("attempts: {}  (enter two card numbers, q to quit)", self.attempts));
        out
    }

    fn is_finished(&self) -> bool {
        self.started && !self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn pair_positions(game: &MemoryGame) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..game.card_count() {
            for j in (i + 1)..game.card_count() {
                if game.peek(i) == game.peek(j) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_start_deals_shuffled_pairs() {
        let mut game = MemoryGame::with_seed(4, 1);
        game.start();
        assert_eq!(game.card_count(), 8);
        assert_eq!(pair_positions(&game).len(), 4);
    }

    #[test]
    fn test_perfect_game_reports_attempts() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let mut game = MemoryGame::with_seed(3, 9);
        game.set_player_name("cy");
        game.set_completion_listener(Arc::new(move |r: ResultRecord| sink.lock().push(r)));
        game.start();

        let pairs = pair_positions(&game);
        // Pairs hold distinct symbols, so this is a guaranteed miss.
        assert_eq!(game.flip(pairs[0].0), FlipOutcome::Revealed);
        assert_eq!(game.flip(pairs[1].0), FlipOutcome::Mismatched);

        for (a, b) in pairs {
            game.flip(a);
            assert_eq!(game.flip(b), FlipOutcome::Matched);
        }

        assert!(game.is_finished());
        assert_eq!(*records.lock(), vec![ResultRecord::new(CATEGORY, "cy", 4)]);
        assert_eq!(game.ranking(), Ranking::LowerIsBetter);
    }

    #[test]
    fn test_ignored_flips() {
        let mut game = MemoryGame::with_seed(2, 5);
        assert_eq!(game.flip(0), FlipOutcome::Ignored);

        game.start();
        assert_eq!(game.flip(99), FlipOutcome::Ignored);
        assert_eq!(game.flip(0), FlipOutcome::Revealed);
        assert_eq!(game.flip(0), FlipOutcome::Ignored);
        assert_eq!(game.current_result().value, 0);
    }
}
