pub mod api;
mod app;
pub mod cli;
pub mod commands;
pub mod formatters;
pub mod http;
pub mod preferences;
pub mod redact;
mod repl;
pub mod routes;
pub mod settings;
pub mod state;
pub mod storage;
pub mod types;

pub fn run() -> anyhow::Result<()> {
    cli::parse(None)
}
