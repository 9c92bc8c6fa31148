//! Snake: steer a growing snake towards apples on a walled grid.
//!
//! Turn-based for terminal play: each input line optionally turns the snake
//! and then advances it one cell. Score is the number of apples eaten.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::models::ResultRecord;
use crate::engine::plugin::{CompletionListener, CompletionSlot, PluggableUnit};

pub const CATEGORY: &str = "Snake";
const DEFAULT_SIZE: i32 = 20;
const INITIAL_LENGTH: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    fn parse(input: &str) -> Option<Direction> {
        match input {
            "w" | "up" => Some(Direction::Up),
            "s" | "down" => Some(Direction::Down),
            "a" | "left" => Some(Direction::Left),
            "d" | "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

pub struct SnakeGame {
    width: i32,
    height: i32,
    /// Head first.
    body: VecDeque<(i32, i32)>,
    direction: Direction,
    apple: Option<(i32, i32)>,
    score: i64,
    running: bool,
    started: bool,
    player: String,
    rng: StdRng,
    completion: CompletionSlot,
}

impl Default for SnakeGame {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_SIZE, StdRng::from_entropy())
    }
}

impl SnakeGame {
    pub fn new(width: i32, height: i32, rng: StdRng) -> Self {
        Self {
            width: width.max(INITIAL_LENGTH + 2),
            height: height.max(3),
            body: VecDeque::new(),
            direction: Direction::Right,
            apple: None,
            score: 0,
            running: false,
            started: false,
            player: "Player".into(),
            rng,
            completion: CompletionSlot::new(),
        }
    }

    pub fn with_seed(width: i32, height: i32, seed: u64) -> Self {
        Self::new(width, height, StdRng::seed_from_u64(seed))
    }

    pub fn head(&self) -> Option<(i32, i32)> {
        self.body.front().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn apple(&self) -> Option<(i32, i32)> {
        self.apple
    }

    /// Move the apple somewhere specific; used to script sessions.
    pub fn place_apple(&mut self, cell: (i32, i32)) {
        self.apple = Some(cell);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Change heading. Reversing straight into the body is ignored.
    pub fn turn(&mut self, direction: Direction) {
        if direction != self.direction.opposite() {
            self.direction = direction;
        }
    }

    /// Advance one cell.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        let Some((hx, hy)) = self.head() else {
            return;
        };
        let (dx, dy) = self.direction.delta();
        let next = (hx + dx, hy + dy);
        let eating = self.apple == Some(next);

        let out_of_bounds = next.0 < 0 || next.1 < 0 || next.0 >= self.width || next.1 >= self.height;
        // The tail cell is vacated this tick unless the snake grows.
        let body_len = if eating { self.body.len() } else { self.body.len() - 1 };
        let bites_itself = self.body.iter().take(body_len).any(|&cell| cell == next);
        if out_of_bounds || bites_itself {
            self.game_over();
            return;
        }

        self.body.push_front(next);
        if eating {
            self.score += 1;
            self.apple = self.free_cell();
            if self.apple.is_none() {
                self.game_over();
            }
        } else {
            self.body.pop_back();
        }
    }

    fn game_over(&mut self) {
        self.running = false;
        let record = self.current_result();
        self.completion.finish(record);
    }

    fn free_cell(&mut self) -> Option<(i32, i32)> {
        let free: Vec<(i32, i32)> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|cell| !self.body.contains(cell))
            .collect();
        if free.is_empty() {
            return None;
        }
        Some(free[self.rng.gen_range(0..free.len())])
    }
}

impl PluggableUnit for SnakeGame {
    fn start(&mut self) {
        let y = self.height / 2;
        let x = self.width / 2;
        self.body = (0..INITIAL_LENGTH).map(|i| (x - i, y)).collect();
        self.direction = Direction::Right;
        self.score = 0;
        self.running = true;
        self.started = true;
        self.apple = self.free_cell();
        self.completion.reset();
    }

    fn set_completion_listener(&mut self, listener: Arc<dyn CompletionListener>) {
        self.completion.set(listener);
    }

    fn current_result(&self) -> ResultRecord {
        ResultRecord::new(CATEGORY, &self.player, self.score)
    }

    fn set_player_name(&mut self, name: &str) {
        if !name.trim().is_empty() {
            self.player = name.trim().to_string();
        }
    }

    fn handle_input(&mut self, input: &str) {
        let input = input.trim().to_ascii_lowercase();
        if input == "q" {
            // Abandoned sessions never report.
            self.running = false;
            return;
        }
        if let Some(direction) = Direction::parse(&input) {
            self.turn(direction);
        }
        self.tick();
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let c = if self.head() == Some((x, y)) {
                    '@'
                } else if self.body.contains(&(x, y)) {
                    'o'
                } else if self.apple == Some((x, y)) {
                    '*'
                } else {
                    '.'
                };
                out.push(c);
            }
            out.push('\n');
        }
        out.push_str(&format!("apples: {}  (w/a/s/d to steer, q to quit)", self.score));
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

    fn started(seed: u64) -> SnakeGame {
        let mut game = SnakeGame::with_seed(10, 10, seed);
        game.start();
        game
    }

    #[test]
    fn test_start_places_snake_and_apple() {
        let game = started(1);
        assert_eq!(game.len(), INITIAL_LENGTH as usize);
        assert_eq!(game.head(), Some((5, 5)));
        let apple = game.apple().unwrap();
        assert!(!game.body.contains(&apple));
        assert!(game.is_running());
    }

    #[test]
    fn test_eating_grows_and_scores() {
        let mut game = started(2);
        game.place_apple((6, 5));
        game.tick();
        assert_eq!(game.head(), Some((6, 5)));
        assert_eq!(game.len(), 4);
        assert_eq!(game.current_result().value, 1);
    }

    #[test]
    fn test_reverse_turn_is_ignored() {
        let mut game = started(3);
        game.place_apple((0, 0));
        game.turn(Direction::Left);
        game.tick();
        assert_eq!(game.head(), Some((6, 5)));
    }

    #[test]
    fn test_wall_collision_reports_once() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let mut game = started(4);
        game.set_player_name("ana");
        game.set_completion_listener(Arc::new(move |r: ResultRecord| sink.lock().push(r)));
        game.place_apple((0, 0));

        for _ in 0..10 {
            game.handle_input("d");
        }
        assert!(game.is_finished());
        let records = records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], ResultRecord::new(CATEGORY, "ana", 0));
    }

    #[test]
    fn test_quit_does_not_report() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let mut game = started(5);
        game.set_completion_listener(Arc::new(move |r: ResultRecord| sink.lock().push(r)));
        game.handle_input("q");
        assert!(game.is_finished());
        assert!(records.lock().is_empty());
    }

    #[test]
    fn test_restart_resets_session() {
        let mut game = started(6);
        game.place_apple((6, 5));
        game.tick();
        game.start();
        assert_eq!(game.current_result().value, 0);
        assert_eq!(game.len(), INITIAL_LENGTH as usize);
    }
}
