use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use readrank::config::{load_settings, snapshot_path, validate_settings, Settings};
use readrank::domain::{CompetitionId, Standing, UserId};
use readrank::error::{CoreError, ErrorKind};
use readrank::output::{self, LeaderboardRow, StandingRow};
use readrank::ranking::{BoundedRankingStore, InMemoryRankingStore};
use readrank::repository::{
    load_snapshot, save_snapshot, InMemoryCompetitionRepository, InMemoryReadingRepository,
    InMemoryUserRepository, Snapshot,
};
use readrank::service::{
    parse_instant, CreateCompetition, LogReading, Repositories, ServiceOptions, Services,
};

const EXIT_SUCCESS: i32 = 0;
const EXIT_SERVER: i32 = 2;
const EXIT_UNAVAILABLE: i32 = 3;
const EXIT_INPUT: i32 = 4;
const EXIT_CONFIG: i32 = 5;

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a reader
    Add {
        email: String,
        /// Display name (2-64 characters)
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum CompetitionCommand {
    /// Create an open competition
    Create {
        name: String,
        /// First day, YYYY-MM-DD or RFC 3339
        #[arg(long)]
        start: String,
        /// Last day (inclusive), YYYY-MM-DD or RFC 3339
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = 1)]
        points_per_minute: i64,
    },
    /// Add a reader to a competition
    Join { competition: String, user: String },
    /// Close a competition and print final standings
    Close { competition: String },
    /// List competitions, optionally only those a reader joined
    List {
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage readers
    #[command(subcommand)]
    User(UserCommand),
    /// Manage competitions
    #[command(subcommand)]
    Competition(CompetitionCommand),
    /// Log a reading session
    Log {
        user: String,
        minutes: i64,
        #[arg(long)]
        source: Option<String>,
        /// When the session happened (default: now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Show the top of a competition's leaderboard
    Leaderboard {
        competition: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
    },
    /// Show one reader's position in a competition
    Rank { competition: String, user: String },
    /// Show ledger standings of a competition
    Standings { competition: String },
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::User(_)
                | Commands::Log { .. }
                | Commands::Competition(
                    CompetitionCommand::Create { .. }
                        | CompetitionCommand::Join { .. }
                        | CompetitionCommand::Close { .. }
                )
        )
    }
}

#[derive(Parser, Debug)]
#[command(name = "readrank")]
#[command(about = "Reading competition scoring and leaderboards", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/readrank/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to state file (overrides storage.snapshot_path)
    #[arg(long, global = true)]
    state: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn exit_code(err: &CoreError) -> i32 {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::NotFound => EXIT_INPUT,
        ErrorKind::Server => EXIT_SERVER,
        ErrorKind::Unavailable => EXIT_UNAVAILABLE,
    }
}

/// In-memory state loaded from the snapshot, plus the services over it.
struct App {
    competitions: Arc<InMemoryCompetitionRepository>,
    users: Arc<InMemoryUserRepository>,
    readings: Arc<InMemoryReadingRepository>,
    ranking: Arc<InMemoryRankingStore>,
    services: Services,
}

impl App {
    fn new(snapshot: Snapshot, settings: &Settings) -> anyhow::Result<Self> {
        let deadline = settings
            .ranking
            .deadline()
            .context("Invalid ranking.deadline")?;

        let competitions = Arc::new(InMemoryCompetitionRepository::with_competitions(
            snapshot.competitions,
        ));
        let users = Arc::new(InMemoryUserRepository::with_users(snapshot.users));
        let readings = Arc::new(InMemoryReadingRepository::with_events(snapshot.readings));

        let ranking = Arc::new(InMemoryRankingStore::with_prefix(&settings.ranking.key_prefix));
        ranking.import(snapshot.leaderboards);
        let bounded = Arc::new(BoundedRankingStore::new(
            ranking.clone(),
            deadline,
            settings.ranking.read_retries,
        ));

        let services = Services::new(
            Repositories {
                competitions: competitions.clone(),
                users: users.clone(),
                readings: readings.clone(),
            },
            bounded,
            ServiceOptions {
                max_minutes_per_event: settings.scoring.max_minutes_per_event,
                default_limit: settings.ranking.default_limit,
            },
        );

        Ok(Self {
            competitions,
            users,
            readings,
            ranking,
            services,
        })
    }

    async fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.competitions = self.competitions.export().await;
        snapshot.users = self.users.export().await;
        snapshot.readings = self.readings.export().await;
        snapshot.leaderboards = self.ranking.export();
        snapshot
    }

    /// Display name for a user id, falling back to the id itself.
    async fn name_of(&self, user_id: &UserId) -> String {
        match self.services.users.get(user_id).await {
            Ok(user) => user.display_name,
            Err(_) => user_id.to_string(),
        }
    }

    async fn run(&self, command: Commands, use_colors: bool) -> Result<(), CoreError> {
        match command {
            Commands::User(UserCommand::Add { email, name }) => {
                let user = self.services.users.register(&email, &name).await?;
                println!("{}", user.id);
            }
            Commands::Competition(CompetitionCommand::Create {
                name,
                start,
                end,
                points_per_minute,
            }) => {
                let competition = self
                    .services
                    .lifecycle
                    .create(CreateCompetition {
                        name,
                        start: parse_instant(&start, false)?,
                        end: parse_instant(&end, true)?,
                        points_per_minute,
                    })
                    .await?;
                println!("{}", competition.id);
            }
            Commands::Competition(CompetitionCommand::Join { competition, user }) => {
                self.services
                    .lifecycle
                    .join(&CompetitionId::from(competition), &UserId::from(user))
                    .await?;
            }
            Commands::Competition(CompetitionCommand::Close { competition }) => {
                let standings = self
                    .services
                    .lifecycle
                    .close(&CompetitionId::from(competition))
                    .await?;
                self.print_standings(&standings, use_colors).await;
            }
            Commands::Competition(CompetitionCommand::List { user }) => {
                let list = match user {
                    Some(user) => {
                        self.services
                            .lifecycle
                            .list_for_user(&UserId::from(user))
                            .await?
                    }
                    None => self.services.lifecycle.list_all().await?,
                };
                println!(
                    "{}",
                    output::format_competition_list(&list, Utc::now(), use_colors)
                );
            }
            Commands::Log {
                user,
                minutes,
                source,
                at,
            } => {
                let timestamp = match at {
                    Some(at) => parse_instant(&at, false)?,
                    None => Utc::now(),
                };
                let outcome = self
                    .services
                    .coordinator
                    .handle_reading_event(LogReading {
                        user_id: UserId::from(user),
                        minutes,
                        source,
                        timestamp,
                    })
                    .await?;
                println!("{}", output::format_reading_outcome(&outcome, use_colors));

                let failures = outcome.ledger_failures();
                if failures > 0 {
                    return Err(CoreError::server(format!(
                        "reading not recorded in {} of {} competitions",
                        failures,
                        outcome.accruals.len()
                    )));
                }
            }
            Commands::Leaderboard {
                competition,
                limit,
                tsv,
            } => {
                let entries = self
                    .services
                    .leaderboard
                    .top(&CompetitionId::from(competition), limit)
                    .await?;

                let mut names = Vec::with_capacity(entries.len());
                for entry in &entries {
                    names.push(self.name_of(&entry.user_id).await);
                }
                let rows: Vec<LeaderboardRow> = entries
                    .iter()
                    .zip(&names)
                    .enumerate()
                    .map(|(idx, (entry, name))| LeaderboardRow {
                        place: idx as u64 + 1,
                        name,
                        score: entry.score,
                    })
                    .collect();

                if tsv {
                    println!("{}", output::format_tsv(&rows));
                } else {
                    println!("{}", output::format_leaderboard(&rows, use_colors));
                }
            }
            Commands::Rank { competition, user } => {
                let user_id = UserId::from(user);
                let position = self
                    .services
                    .leaderboard
                    .rank(&CompetitionId::from(competition), &user_id)
                    .await?;
                let name = self.name_of(&user_id).await;
                match position {
                    Some(pos) => println!(
                        "{}: #{} with {}",
                        name,
                        pos.place(),
                        output::format_score(pos.score)
                    ),
                    None => println!("{}: no score recorded", name),
                }
            }
            Commands::Standings { competition } => {
                let standings = self
                    .services
                    .lifecycle
                    .standings(&CompetitionId::from(competition))
                    .await?;
                self.print_standings(&standings, use_colors).await;
            }
        }
        Ok(())
    }

    async fn print_standings(&self, standings: &[Standing], use_colors: bool) {
        let mut names = Vec::with_capacity(standings.len());
        for standing in standings {
            names.push(self.name_of(&standing.user_id).await);
        }
        let rows: Vec<StandingRow> = standings
            .iter()
            .zip(&names)
            .map(|(standing, name)| StandingRow { standing, name })
            .collect();
        println!("{}", output::format_standings(&rows, use_colors));
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(cli.config.map(PathBuf::from)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = validate_settings(&settings) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let state_path = match cli.state.map(PathBuf::from) {
        Some(p) => p,
        None => match snapshot_path(&settings) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Config error: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        },
    };

    let snapshot = match load_snapshot(&state_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("State error: {:#}", e);
            std::process::exit(EXIT_SERVER);
        }
    };

    let app = match App::new(snapshot, &settings) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let mutates = cli.command.mutates();
    let result = app.run(cli.command, output::should_use_colors()).await;

    // A failed command may still have committed part of its work (the streak
    // update of a reading whose fan-out failed), so state is saved either way.
    if mutates {
        if let Err(e) = save_snapshot(&state_path, &app.snapshot().await) {
            eprintln!("State error: {:#}", e);
            std::process::exit(EXIT_SERVER);
        }
    }

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
