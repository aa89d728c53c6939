use crate::config::Config;
use crate::data::faculty::{Faculty, FacultyTables, SchemaLayout, legacy_unique_keys};
use crate::data::memory::MemoryService;
use crate::data::postgres::PgService;
use crate::data::professors::{RegisterError, register_professor};
use crate::data::ranking::{RankingQuery, build_ranking_view};
use crate::data::service::{DataService, Deadline};
use crate::display::FormattedRow;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    postgres: Option<Arc<PgService>>,
    app_state: AppState,
}

impl App {
    /// Connect the configured backend and build shared state.
    ///
    /// With `DATABASE_URL` unset the in-memory backend is used and nothing persists.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let (data, postgres) = match &config.database_url {
            Some(url) => {
                let pg = Arc::new(PgService::connect(url).await?);
                // Legacy tables are owned by the hosted backend; only the unified schema is ours to migrate.
                match config.schema_layout {
                    SchemaLayout::Unified => pg.migrate().await?,
                    SchemaLayout::Legacy => pg.ensure_unique_keys(&legacy_unique_keys()).await?,
                }
                let data: Arc<dyn DataService> =
                    Arc::new(Deadline::new(pg.clone(), config.request_timeout));
                (data, Some(pg))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory data service");
                let data: Arc<dyn DataService> =
                    Arc::new(Deadline::new(MemoryService::new(), config.request_timeout));
                (data, None)
            }
        };

        info!(
            backend = if postgres.is_some() { "postgres" } else { "memory" },
            layout = ?config.schema_layout,
            request_timeout = fmt_duration(config.request_timeout),
            "data service ready"
        );

        let app_state = AppState::new(data, config.clone());
        Ok(App {
            config,
            postgres,
            app_state,
        })
    }

    /// Serve the HTTP API until a shutdown signal arrives.
    pub async fn serve(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(%addr, "web server listening");

        let token = CancellationToken::new();
        let sweeper = tokio::spawn(
            self.app_state
                .clone()
                .sweep_views(self.config.view_ttl, token.clone()),
        );
        let router = create_router(self.app_state.clone());
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(token.clone().cancelled_owned());
        let mut handle = tokio::spawn(async move { server.await });

        tokio::select! {
            result = &mut handle => {
                token.cancel();
                return result.context("Web server task panicked")?.context("Web server failed");
            }
            () = shutdown_signal() => {}
        }

        info!(
            timeout = fmt_duration(self.config.shutdown_timeout),
            "shutdown signal received, draining requests"
        );
        token.cancel();
        if let Err(e) = sweeper.await {
            warn!(error = %e, "view sweeper task failed");
        }
        match tokio::time::timeout(self.config.shutdown_timeout, handle).await {
            Ok(Ok(Ok(()))) => {
                info!("web server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(anyhow::Error::from(e).context("Web server failed")),
            Ok(Err(e)) => Err(anyhow::Error::from(e).context("Web server task panicked")),
            Err(_) => {
                warn!("graceful shutdown timed out, exiting");
                Ok(())
            }
        }
    }

    /// Print a faculty's ranking as a table.
    pub async fn rank(&self, query: RankingQuery, limit: Option<usize>) -> Result<(), anyhow::Error> {
        let view = build_ranking_view(
            self.app_state.data.as_ref(),
            self.config.schema_layout,
            &query,
            self.config.qualification_threshold,
        )
        .await
        .context("Failed to build ranking")?;

        println!("{} ({} professors)", query.faculty.label(), view.total);
        for row in view.rows.iter().take(limit.unwrap_or(usize::MAX)) {
            let f = FormattedRow::from(row);
            println!(
                "{:>4}  {:<32} {:>5}  P {:>4}  M {:>4}  R {:>4}  {}",
                f.rank, f.name, f.weighted, f.personality, f.method, f.responsibility, f.rating_label
            );
        }
        Ok(())
    }

    /// Register a professor from the command line.
    pub async fn add_professor(&self, faculty: Faculty, name: &str) -> Result<(), anyhow::Error> {
        let tables = FacultyTables::resolve(faculty, self.config.schema_layout);
        match register_professor(
            self.app_state.data.as_ref(),
            &tables,
            name,
            self.config.duplicate_threshold,
        )
        .await
        {
            Ok(stored) => {
                println!("Registered {stored} in {}", faculty.label());
                Ok(())
            }
            Err(RegisterError::Duplicate { similar }) => {
                for s in &similar {
                    error!(name = %s.name, distance = s.distance, "similar professor exists");
                }
                anyhow::bail!("{name:?} is too similar to {} existing professor(s)", similar.len())
            }
            Err(e) => Err(anyhow::Error::from(e).context("Failed to register professor")),
        }
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        let pg = self
            .postgres
            .as_ref()
            .context("migrate requires DATABASE_URL")?;
        pg.migrate().await
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_without_database_url() {
        let app = App::new(Config::default()).await.unwrap();
        assert!(app.postgres.is_none());
        assert!(app.migrate().await.is_err());
    }

    #[tokio::test]
    async fn add_professor_rejects_duplicates() {
        let app = App::new(Config::default()).await.unwrap();
        app.add_professor(Faculty::Derecho, "Juan Perez").await.unwrap();
        assert!(app.add_professor(Faculty::Derecho, "Juan Peres").await.is_err());
        app.rank(RankingQuery::new(Faculty::Derecho), Some(10)).await.unwrap();
    }
}
