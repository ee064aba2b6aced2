use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quest_core::model::AchievementId;
use quest_core::{Catalog, Reducer};
use services::GameService;
use storage::{ProgressStore, SqliteStore};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingId { command: &'static str },
    InvalidPoints { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingId { command } => write!(f, "{command} requires --id"),
            ArgsError::InvalidPoints { raw } => write!(f, "invalid --points value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    CompleteActivity,
    CompleteSection,
    SetSection,
    Unlock,
    Export,
    Import,
    Cleanup,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "complete-activity" => Some(Self::CompleteActivity),
            "complete-section" => Some(Self::CompleteSection),
            "set-section" => Some(Self::SetSection),
            "unlock" => Some(Self::Unlock),
            "export" => Some(Self::Export),
            "import" => Some(Self::Import),
            "cleanup" => Some(Self::Cleanup),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    id: Option<String>,
    points: u32,
    file: Option<PathBuf>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status             [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- complete-activity  --id <activity> --points <n>");
    eprintln!("  cargo run -p app -- complete-section   --id <section>");
    eprintln!("  cargo run -p app -- set-section        --id <section>");
    eprintln!("  cargo run -p app -- unlock             --id <achievement>");
    eprintln!("  cargo run -p app -- export             [--file <path>]");
    eprintln!("  cargo run -p app -- import             --file <path>");
    eprintln!("  cargo run -p app -- cleanup            # remove quarantined backups");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:progress.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUEST_DB_URL");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUEST_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://progress.sqlite3".into(), |raw| normalize_sqlite_url(&raw));
        let mut id = None;
        let mut points = 0;
        let mut file = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(&value);
                }
                "--id" => id = Some(require_value(args, "--id")?),
                "--points" => {
                    let value = require_value(args, "--points")?;
                    points = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidPoints { raw: value.clone() })?;
                }
                "--file" => file = Some(PathBuf::from(require_value(args, "--file")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            id,
            points,
            file,
        })
    }

    fn require_id(&self, command: &'static str) -> Result<&str, ArgsError> {
        self.id
            .as_deref()
            .ok_or(ArgsError::MissingId { command })
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = Path::new(path.split('?').next().unwrap_or(path));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_status(service: &GameService) {
    let state = service.state();
    let catalog = service.catalog();

    println!("Section:    {}", state.progress.current_section);
    println!("Score:      {} points", state.progress.total_score);
    println!("Streak:     {}", state.progress.streak_count);
    println!(
        "Sections:   {}/{} complete ({}%)",
        state.progress.completed_sections.len(),
        catalog.total_sections(),
        service.completion_percentage()
    );
    println!(
        "Activities: {} complete",
        state.progress.completed_activities.len()
    );
    println!("Achievements:");
    for achievement in &state.progress.achievements {
        let marker = if achievement.unlocked { "✓" } else { " " };
        println!(
            "  {marker} {} {} — {}",
            achievement.icon, achievement.title, achievement.description
        );
    }
    if let Some(error) = &state.storage_error {
        eprintln!("warning: {error}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let command = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first.to_owned())
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).inspect_err(|_| print_usage())?;

    prepare_sqlite_file(&args.db_url)?;
    let backend = Arc::new(SqliteStore::open(&args.db_url).await?);

    let catalog = Catalog::builtin();
    let reducer = Reducer::new(catalog.clone());
    let store = ProgressStore::new(backend.clone(), catalog.clone());
    let service = GameService::new(reducer, store);
    service.init().await;

    match command {
        Command::Status => print_status(&service),
        Command::CompleteActivity => {
            let id = args.require_id("complete-activity")?.to_owned();
            service.complete_activity(id.as_str(), args.points).await;
            println!(
                "completed activity {id}: score is now {}",
                service.state().progress.total_score
            );
            print_save_warning(&service);
        }
        Command::CompleteSection => {
            let id = args.require_id("complete-section")?.to_owned();
            service.complete_section(id.as_str()).await;
            println!(
                "completed section {id} ({}% of the course)",
                service.completion_percentage()
            );
            print_save_warning(&service);
        }
        Command::SetSection => {
            let id = args.require_id("set-section")?.to_owned();
            service.set_current_section(id.as_str()).await;
            println!("current section is now {id}");
            print_save_warning(&service);
        }
        Command::Unlock => {
            let id = args.require_id("unlock")?.to_owned();
            match service.achievement(&AchievementId::new(id.as_str())) {
                Some(achievement) if achievement.unlocked => {
                    println!("{id} is already unlocked");
                }
                Some(achievement) => {
                    service.unlock_achievement(achievement).await;
                    println!("unlocked {id}");
                    print_save_warning(&service);
                }
                None => eprintln!("no achievement with id {id}"),
            }
        }
        Command::Export => {
            let document = service
                .export()
                .ok_or("failed to render the export document")?;
            match &args.file {
                Some(path) => {
                    std::fs::write(path, document)?;
                    println!("exported progress to {}", path.display());
                }
                None => println!("{document}"),
            }
        }
        Command::Import => {
            let path = args.file.as_deref().ok_or("import requires --file")?;
            let raw = std::fs::read_to_string(path)?;
            if service.import(&raw).await {
                println!("imported progress from {}", path.display());
                print_save_warning(&service);
            } else {
                return Err("import rejected: not a valid export document".into());
            }
        }
        Command::Cleanup => {
            // A dedicated adapter over the same backend for maintenance ops;
            // the service keeps the one it owns.
            let maintenance = ProgressStore::new(backend, catalog);
            let removed = maintenance.cleanup_quarantine().await;
            println!("removed {removed} quarantined backup(s)");
        }
    }

    Ok(())
}

fn print_save_warning(service: &GameService) {
    if let Some(error) = service.state().storage_error {
        eprintln!("warning: {error}");
    }
}

#[tokio::main]
async fn main() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .compact()
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
