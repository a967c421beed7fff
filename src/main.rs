//! flow - track work sessions from the command line
//!
//! Run with `flow --help` for usage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use flow_cli::{
    APP_NAME, Config, Session, SessionFilter, SessionId, SessionManager, SessionState, SortField,
    SortOrder, VERSION,
    git::GitBackend,
    session::{Transition, format_duration, parse_context_entries},
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Track work sessions per project and task")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session
    Start {
        /// Project name (default: repository or directory name)
        project: Option<String>,

        /// What you are working on
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Pause the active session
    Pause,

    /// Resume a paused session (default: the most recent one)
    Resume {
        /// Session ID
        id: Option<SessionId>,
    },

    /// End the current session
    End {
        /// Outcome to record (default from config)
        #[arg(short, long)]
        outcome: Option<String>,
    },

    /// Add KEY=VALUE entries to the current session's context
    Context {
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Show the current session and git status
    Status {
        /// Working tree to inspect (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List sessions
    List {
        #[arg(long)]
        state: Option<SessionState>,

        #[arg(short, long)]
        project: Option<String>,

        /// Started at or after (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Started at or before (RFC 3339 or YYYY-MM-DD, inclusive of the day)
        #[arg(long, value_parser = parse_until)]
        until: Option<DateTime<Utc>>,

        /// Maximum rows (default from config, 0 = all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// start-time or duration
        #[arg(long, default_value = "start-time")]
        sort: SortField,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Worked time per project over ended sessions
    Report {
        /// Started at or after (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Delete a session record
    Delete {
        /// Session ID
        id: SessionId,
    },

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
            .add_directive("flow_cli=info".parse()?)
            .add_directive("gix=warn".parse()?)
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file).with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

fn parse_time(s: &str, end_of_day: bool) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected RFC 3339 or YYYY-MM-DD, got '{}'", s))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    time.map(|t| date.and_time(t).and_utc())
        .ok_or_else(|| format!("invalid time for '{}'", s))
}

fn parse_since(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_time(s, false)
}

fn parse_until(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_time(s, true)
}

/// Project name for the working directory: repository name, else directory name
fn default_project(cwd: &Path) -> String {
    match GitBackend::discover(cwd) {
        Ok(backend) => backend.repo_name(),
        Err(_) => cwd
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("default")
            .to_string(),
    }
}

fn print_transition(verb: &str, transition: &Transition) {
    let session = &transition.session;
    println!(
        "{} {} [{}]{}",
        verb,
        session.id().short(),
        session.project(),
        session.task().map(|t| format!(" {}", t)).unwrap_or_default()
    );
    debug!("event: {}", transition.event);
}

fn print_session_row(session: &Session) {
    let now = Utc::now();
    let icon = match session.state() {
        SessionState::Active => "●",
        SessionState::Paused => "◐",
        SessionState::Ended => "○",
    };
    println!(
        "  {} {}  {}  {:<20} {:>10}  {}",
        icon,
        session.id().short(),
        session.start_time().format("%Y-%m-%d %H:%M"),
        session.project(),
        format_duration(session.elapsed(now)),
        session.task().unwrap_or("")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    setup_logging(cli.debug || config.debug, config.log_file.as_deref())?;

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Failed to create directories: {}", e);
    }

    let manager = SessionManager::from_config(&config)?;
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Start { project, task } => {
            let project = project.unwrap_or_else(|| default_project(&cwd));
            let transition = manager.start(&project, task).await?;
            print_transition("Started", &transition);
        }

        Commands::Pause => {
            let transition = manager.pause().await?;
            print_transition("Paused", &transition);
        }

        Commands::Resume { id } => {
            let transition = manager.resume(id.as_ref()).await?;
            print_transition("Resumed", &transition);
        }

        Commands::End { outcome } => {
            let transition = manager.end(outcome).await?;
            print_transition("Ended", &transition);
            if let Some(duration) = transition.session.duration() {
                println!(
                    "  {} worked, outcome: {}",
                    format_duration(duration),
                    transition.session.outcome().unwrap_or_default()
                );
            }
        }

        Commands::Context { entries } => {
            let updates = parse_context_entries(entries.as_slice())?;
            let transition = manager.update_context(updates).await?;
            print_transition("Updated", &transition);
            for (key, value) in transition.session.context() {
                println!("  {} = {}", key, value);
            }
        }

        Commands::Status { path, json } => {
            let path = path.unwrap_or(cwd);
            let report = manager.status(&path).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            match &report.session {
                Some(session) => {
                    println!(
                        "{} {} [{}] {}",
                        session.state(),
                        session.id().short(),
                        session.project(),
                        session.task().unwrap_or("")
                    );
                    if let Some(elapsed) = report.elapsed {
                        println!("  elapsed: {}", format_duration(elapsed));
                    }
                    for (key, value) in session.context() {
                        println!("  {} = {}", key, value);
                    }
                }
                None => println!("No active session. Start one with 'flow start'."),
            }

            match &report.git {
                Some(git) => {
                    println!("git: {}", git.summary());
                    for file in &git.uncommitted_files {
                        println!("  {}", file);
                    }
                    if let Some(message) = &report.last_commit {
                        println!("last commit: {}", message.lines().next().unwrap_or(""));
                    }
                }
                None => println!("git: not a repository"),
            }
        }

        Commands::List {
            state,
            project,
            since,
            until,
            limit,
            sort,
            order,
            json,
        } => {
            let limit = limit.unwrap_or(config.list_limit);
            let filter = SessionFilter {
                state,
                project,
                since,
                until,
                limit: (limit > 0).then_some(limit),
                order_by: sort,
                order,
            };

            let sessions = manager.list(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }

            let total = manager.count(&filter).await?;
            if sessions.is_empty() {
                println!("No sessions.");
            } else {
                for session in &sessions {
                    print_session_row(session);
                }
                if total > sessions.len() {
                    println!("  ... {} of {} shown", sessions.len(), total);
                }
            }
        }

        Commands::Report { since, project } => {
            let filter = SessionFilter {
                since,
                project,
                ..SessionFilter::default()
            };
            let summary = manager.summarize(&filter).await?;

            if summary.is_empty() {
                println!("No sessions.");
            }
            for row in summary {
                println!(
                    "  {:<20} {:>4} sessions  {:>12}",
                    row.project,
                    row.sessions,
                    format_duration(row.total)
                );
            }
        }

        Commands::Delete { id } => {
            if manager.delete(&id).await? {
                println!("Deleted {}", id);
            } else {
                println!("Session not found: {}", id);
            }
        }

        Commands::Config { init } => {
            let config_path = match cli.config {
                Some(path) => path,
                None => Config::config_file_path()?,
            };

            if init {
                config.save_to(&config_path)?;
                println!("Configuration initialized at {:?}", config_path);
            } else {
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {:?}", config_path);
                println!("Data dir: {:?}", config.data_dir()?);
                println!("Sessions file: {:?}", config.sessions_file_path()?);
            }
        }
    }

    Ok(())
}
