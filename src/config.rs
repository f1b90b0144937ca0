use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use tracing::info;

use crate::db::{self, PgSource};
use crate::fixture::InMemorySource;
use crate::source::{DataSource, RankingService};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Embedded demonstration dataset
    Fixture,
    /// PostgreSQL via DATABASE_URL
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: SourceKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    /// Build from the chosen source kind plus the process environment.
    pub fn from_env(source: SourceKind) -> anyhow::Result<Self> {
        let max_connections = match std::env::var("DASHBOARD_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("DASHBOARD_MAX_CONNECTIONS is not a number: {value}"))?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            source,
            database_url: std::env::var("DATABASE_URL").ok(),
            max_connections,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

/// The configured data source together with its ranking service.
pub struct Backend {
    pub source: Arc<dyn DataSource>,
    pub ranking: Arc<dyn RankingService>,
}

pub async fn open_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.source {
        SourceKind::Fixture => {
            info!("using embedded fixture dataset");
            let source = Arc::new(InMemorySource::demo()?);
            Ok(Backend {
                source: source.clone(),
                ranking: source,
            })
        }
        SourceKind::Postgres => {
            let pool = db::connect(config.database_url()?, config.max_connections).await?;
            info!(max_connections = config.max_connections, "connected to Postgres");
            let source = Arc::new(PgSource::new(pool));
            Ok(Backend {
                source: source.clone(),
                ranking: source,
            })
        }
    }
}
