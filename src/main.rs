//! CLI entry point for tabfetch.

mod app;
mod app_config;
mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::runtime::run_tabfetch().await
}
