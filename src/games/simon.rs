//! Simon Dice: repeat a growing sequence of colors.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::models::ResultRecord;
use crate::engine::plugin::{CompletionListener, CompletionSlot, PluggableUnit};

pub const CATEGORY: &str = "Rondas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

const COLORS: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

impl Color {
    fn parse(input: &str) -> Option<Color> {
        match input {
            "r" | "red" | "1" => Some(Color::Red),
            "g" | "green" | "2" => Some(Color::Green),
            "b" | "blue" | "3" => Some(Color::Blue),
            "y" | "yellow" | "4" => Some(Color::Yellow),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
        }
    }
}

pub struct SimonGame {
    sequence: Vec<Color>,
    /// Position of the next expected press within `sequence`.
    cursor: usize,
    rounds: i64,
    running: bool,
    started: bool,
    player: String,
    rng: StdRng,
    completion: CompletionSlot,
}

impl Default for SimonGame {
    fn default() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl SimonGame {
    pub fn new(rng: StdRng) -> Self {
        Self {
            sequence: Vec::new(),
            cursor: 0,
            rounds: 0,
            running: false,
            started: false,
            player: "Player".into(),
            rng,
            completion: CompletionSlot::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn sequence(&self) -> &[Color] {
        &self.sequence
    }

    /// Register one press. A wrong color ends the session.
    pub fn press(&mut self, color: Color) {
        if !self.running {
            return;
        }
        if self.sequence.get(self.cursor) != Some(&color) {
            self.running = false;
            let record = self.current_result();
            self.completion.finish(record);
            return;
        }
        self.cursor += 1;
        if self.cursor == self.sequence.len() {
            self.rounds += 1;
            self.cursor = 0;
            self.extend();
        }
    }

    fn extend(&mut self) {
        let color = COLORS[self.rng.gen_range(0..COLORS.len())];
        self.sequence.push(color);
    }
}

impl PluggableUnit for SimonGame {
    fn start(&mut self) {
        self.sequence.clear();
        self.cursor = 0;
        self.rounds = 0;
        self.running = true;
        self.started = true;
        self.completion.reset();
        self.extend();
    }

    fn set_completion_listener(&mut self, listener: Arc<dyn CompletionListener>) {
        self.completion.set(listener);
    }

    fn current_result(&self) -> ResultRecord {
        ResultRecord::new(CATEGORY, &self.player, self.rounds)
    }

    fn set_player_name(&mut self, name: &str) {
        if !name.trim().is_empty() {
            self.player = name.trim().to_string();
        }
    }

    fn handle_input(&mut self, input: &str) {
        let input = input.trim().to_ascii_lowercase();
        if input == "q" {
            self.running = false;
            return;
        }
        for token in input.split_whitespace() {
            match Color::parse(token) {
                Some(color) => self.press(color),
                None => tracing::debug!(token, "ignoring unknown color"),
            }
        }
    }

    fn render(&self) -> String {
        if !self.running {
            return format!("rounds: {}", self.rounds);
        }
        if self.cursor == 0 {
            let shown: Vec<&str> = self.sequence.iter().map(|c| c.label()).collect();
            format!(
                "round {}: {}  (answer with r/g/b/y)",
                self.rounds + 1,
                shown.join(" ")
            )
        } else {
            format!("round {}: {} of {} entered", self.rounds + 1, self.cursor, self.sequence.len())
        }
    }

    fn is_finished(&self) -> bool {
        self.started && !self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn wrong(color: Color) -> Color {
        COLORS.into_iter().find(|c| *c != color).unwrap()
    }

    #[test]
    fn test_correct_sequence_advances_round() {
        let mut game = SimonGame::with_seed(7);
        game.start();
        assert_eq!(game.sequence().len(), 1);

        let first = game.sequence()[0];
        game.press(first);
        assert_eq!(game.current_result().value, 1);
        assert_eq!(game.sequence().len(), 2);
        assert_eq!(game.sequence()[0], first);
    }

    #[test]
    fn test_wrong_press_ends_session_with_rounds() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let mut game = SimonGame::with_seed(11);
        game.set_player_name("bo");
        game.set_completion_listener(Arc::new(move |r: ResultRecord| sink.lock().push(r)));
        game.start();

        for _ in 0..3 {
            let sequence = game.sequence().to_vec();
            for color in sequence {
                game.press(color);
            }
        }
        let expected = game.sequence()[0];
        game.press(wrong(expected));
        game.press(expected);

        assert!(game.is_finished());
        assert_eq!(*records.lock(), vec![ResultRecord::new(CATEGORY, "bo", 3)]);
    }

    #[test]
    fn test_text_input_accepts_color_tokens() {
        let mut game = SimonGame::with_seed(3);
        game.start();
        let answer = game.sequence()[0].label().to_string();
        game.handle_input(&answer.to_uppercase());
        assert_eq!(game.current_result().value, 1);
        assert!(game.render().starts_with("round 2"));
    }
}
