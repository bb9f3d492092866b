pub(crate) mod cli;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::file_archive::archive_from_settings;
use crate::services::quiz_generation::QuizGenerationClient;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = cli::parse_command(std::env::args().skip(1))?;

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!(
        environment = %settings.runtime().environment.as_str(),
        "Database ready"
    );

    if !command.needs_state() {
        return Ok(());
    }

    let generation = QuizGenerationClient::from_settings(&settings)?;
    let archive = archive_from_settings(&settings).await?;
    let state = AppState::new(settings, db_pool, generation, archive);

    let result = cli::execute(command, &state).await;

    if let Some(snapshot) = core::metrics::render() {
        eprintln!("{snapshot}");
    }
    state.db().close().await;

    result
}
