use std::{process, sync::Arc};

use murmur::{
    application::{comments::CommentService, error::AppError},
    cache::{CacheConfig, CacheCoordinator},
    config,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Some(config::Command::Migrate(_)) => run_migrate(&settings).await,
        Some(config::Command::Recount(args)) => run_recount(&settings, args.post_id).await,
        Some(config::Command::Check(_)) | None => run_check(&settings).await,
    }
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!(target = "murmur::migrate", "database migrations applied");
    Ok(())
}

async fn run_recount(settings: &config::Settings, post_id: Uuid) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    let service = CommentService::new(
        repositories.clone(),
        repositories.clone(),
        repositories,
        CacheCoordinator::from_config(CacheConfig::from(&settings.cache)),
    )
    .with_rules(settings.comments.rules())
    .with_page_limits(settings.comments.page_limits());

    let live = service.recount(post_id).await?;
    info!(
        target = "murmur::recount",
        post_id = %post_id,
        live,
        "comment counter reconciled"
    );
    Ok(())
}

async fn run_check(settings: &config::Settings) -> Result<(), AppError> {
    let repositories = connect(settings).await?;
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    let ready = repositories
        .schema_ready()
        .await
        .map_err(InfraError::from)?;
    if !ready {
        return Err(InfraError::configuration(
            "comment schema is missing; run `murmur migrate` first",
        )
        .into());
    }
    info!(
        target = "murmur::check",
        cache_enabled = settings.cache.enabled,
        max_depth = settings.comments.max_depth,
        "database reachable"
    );
    Ok(())
}

async fn connect(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}
