use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use minigame_launcher::engine::config::{load_config, load_default_config};
use minigame_launcher::engine::controller::Controller;
use minigame_launcher::LauncherError;

#[derive(Parser)]
#[command(name = "minigame-launcher", about = "Play mini-games and add new ones from packages")]
struct Cli {
    /// Path to launcher.toml (default: auto-discover)
    #[arg(long, env = "MINIGAME_CONFIG")]
    config: Option<PathBuf>,

    /// Scores file, overriding the config
    #[arg(long, env = "MINIGAME_SCORES")]
    scores: Option<PathBuf>,

    /// Extra packages to load before running the command
    #[arg(long = "package")]
    packages: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List available games
    List,
    /// Load packages and show the games they add
    Load { paths: Vec<PathBuf> },
    /// Play a game in the terminal
    Play {
        id: String,
        /// Name recorded with the score
        #[arg(long)]
        player: Option<String>,
    },
    /// Show high scores
    Scores,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("{}", Controller::notification(&e));
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), LauncherError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default_config(),
    };
    if let Some(scores) = cli.scores {
        config.scores_file = scores;
    }
    config.plugin_dirs.extend(cli.packages);

    let controller = Controller::from_config(&config)?;
    tracing::info!(games = ?controller.registry().list_ids(), "registered games");

    match cli.command.unwrap_or(Command::List) {
        Command::List => {
            list_games(&controller);
            Ok(())
        }
        Command::Load { paths } => load_packages(&controller, &paths),
        Command::Play { id, player } => play(&controller, &id, player.as_deref()),
        Command::Scores => {
            show_scores(&controller);
            Ok(())
        }
    }
}

fn list_games(controller: &Controller) {
    println!("Available games:");
    for game in controller.catalog() {
        let origin = if game.external { "package" } else { "built-in" };
        println!("  {:<12} {:<20} [{}]", game.id, game.display_name, origin);
    }
}

fn load_packages(controller: &Controller, paths: &[PathBuf]) -> Result<(), LauncherError> {
    for path in paths {
        let names = controller.load_package(path)?;
        println!("Loaded from {}: {}", path.display(), names.join(", "));
    }
    list_games(controller);
    Ok(())
}

fn play(controller: &Controller, id: &str, player: Option<&str>) -> Result<(), LauncherError> {
    let unit = controller.open(id, player)?;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let (screen, finished) = {
            let guard = unit.lock();
            (guard.render(), guard.is_finished())
        };
        println!("{screen}");
        if finished {
            break;
        }
        print!("> ");
        // A failed flush only delays the prompt.
        let _ = std::io::stdout().flush();
        match lines.next() {
            Some(Ok(line)) => unit.lock().handle_input(&line),
            Some(Err(e)) => return Err(LauncherError::io_at("<stdin>", e)),
            None => break,
        }
    }
    let result = unit.lock().current_result();
    println!("{}: {} ({})", result.category, result.value, result.subject_name);
    Ok(())
}

fn show_scores(controller: &Controller) {
    let scores = controller.scores();
    if scores.is_empty() {
        println!("No scores yet.");
        return;
    }
    for (game, records) in scores {
        println!("{game}:");
        for (rank, record) in records.iter().enumerate() {
            println!(
                "  {}. {:<16} {} {}",
                rank + 1,
                record.subject_name,
                record.value,
                record.category
            );
        }
    }
}
