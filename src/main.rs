use clap::Parser;
use rankprof::app::App;
use rankprof::cli::{Args, Command};
use rankprof::config::Config;
use rankprof::data::ranking::RankingQuery;
use rankprof::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting rankprof"
    );

    match run(config, args.command.unwrap_or_default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "rankprof exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let app = App::new(config).await?;
    match command {
        Command::Serve => app.serve().await,
        Command::Rank {
            faculty,
            mode,
            sort,
            search,
            limit,
        } => {
            let query = RankingQuery::new(faculty)
                .mode(mode)
                .sort(sort)
                .search(search);
            app.rank(query, limit).await
        }
        Command::AddProfessor { faculty, name } => app.add_professor(faculty, &name).await,
        Command::Migrate => app.migrate().await,
    }
}
