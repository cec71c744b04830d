mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod permissions;
mod routes;
mod tracing_config;
mod utils;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    ServiceExt,
    extract::Request,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
};
use clap::{Parser, Subcommand};
use config::Config;
use db::{DBClient, ImportExt};
use dotenv::dotenv;
use mail::Mailer;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(name = "yamdb-backend")]
#[command(about = "Reviews of films, books and music: HTTP API and data loader")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Load the seed CSV files into the database
    LoadData {
        /// Directory holding users.csv, category.csv, genre.csv, ...
        #[arg(long, env = "YAMDB_DATA_DIR", default_value = "static/data")]
        dir: PathBuf,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub mailer: Arc<Mailer>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let _guard = tracing_config::init_tracing();

    let cli = Cli::parse();
    let config = Config::init()?;

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            return Err(err.into());
        }
    };

    sqlx::migrate!("./migrations").run(&pool).await?;

    let db_client = DBClient::new(pool);

    match cli.command.unwrap_or(Command::Serve) {
        Command::LoadData { dir } => {
            let summary = db_client.load_data(&dir).await.map_err(|e| {
                tracing::error!("Loading {} failed: {}", dir.display(), e);
                e as Box<dyn Error>
            })?;
            tracing::info!("Data loaded from {}: {:?}", dir.display(), summary);
            Ok(())
        }
        Command::Serve => serve(config, db_client).await,
    }
}

async fn serve(config: Config, db_client: DBClient) -> Result<(), Box<dyn Error>> {
    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    // keep the scheduler handle alive for as long as the server runs
    let _scheduler = db_client.start_cleanup_task().await?;

    let mailer = Mailer::from_config(&config).map_err(|e| e as Box<dyn Error>)?;

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client,
        mailer: Arc::new(mailer),
    };

    let app = routes::with_trailing_slash_trimmed(routes::create_router(app_state).layer(cors));

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}
