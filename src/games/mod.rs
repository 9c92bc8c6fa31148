pub mod memory;
pub mod simon;
pub mod snake;

use crate::engine::error::Result;
use crate::engine::registry::GameRegistry;

use memory::MemoryGame;
use simon::SimonGame;
use snake::SnakeGame;

/// Register the games that ship with the launcher.
pub fn register_builtin_games(registry: &GameRegistry) -> Result<()> {
    registry.register_builtin("snake", "Snake", SnakeGame::default)?;
    registry.register_builtin("simondice", "Simon Dice", SimonGame::default)?;
    registry.register_builtin("memory", "Memory Game", MemoryGame::default)?;
    Ok(())
}
