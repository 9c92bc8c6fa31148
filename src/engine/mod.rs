pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod models;
pub mod module;
pub mod package;
pub mod plugin;
pub mod registry;
pub mod scores;
