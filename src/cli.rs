use clap::{Parser, Subcommand, ValueEnum};

use crate::data::faculty::Faculty;
use crate::data::ranking::{RankingMode, SortDirection};

/// Professor rating and ranking service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format(), global = true)]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Use pretty formatter (default in debug mode)
    Pretty,
    /// Use JSON formatter (default in release mode)
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the HTTP API (default)
    #[default]
    Serve,
    /// Print a faculty's ranking table
    Rank {
        #[arg(long, value_parser = parse_faculty)]
        faculty: Faculty,
        #[arg(long, value_parser = parse_mode, default_value = "all")]
        mode: RankingMode,
        #[arg(long, value_parser = parse_sort, default_value = "desc")]
        sort: SortDirection,
        #[arg(long, default_value = "")]
        search: String,
        /// Maximum rows to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Register a professor, refusing near-duplicate names
    AddProfessor {
        #[arg(long, value_parser = parse_faculty)]
        faculty: Faculty,
        name: String,
    },
    /// Apply database migrations (PostgreSQL backend only)
    Migrate,
}

fn parse_faculty(s: &str) -> Result<Faculty, String> {
    Faculty::parse(s).ok_or_else(|| {
        let known: Vec<&str> = Faculty::ALL.iter().map(|f| f.as_str()).collect();
        format!("unknown faculty {s:?} (expected one of: {})", known.join(", "))
    })
}

fn parse_mode(s: &str) -> Result<RankingMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "all" => Ok(RankingMode::All),
        "qualified" => Ok(RankingMode::Qualified),
        _ => Err(format!("unknown mode {s:?} (expected all or qualified)")),
    }
}

fn parse_sort(s: &str) -> Result<SortDirection, String> {
    match s.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortDirection::Asc),
        "desc" => Ok(SortDirection::Desc),
        _ => Err(format!("unknown sort {s:?} (expected asc or desc)")),
    }
}
