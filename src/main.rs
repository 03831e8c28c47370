//! cmg-migrate CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use cmg_migrate::{
    commands::{
        cmd_init, cmd_migrate, cmd_status, cmd_verify, print_report, print_status, print_verify,
        InitOptions, MigrateOptions,
    },
    config::Config,
    error::{Error, Result},
    progress::LogWriterFactory,
    target::TargetDb,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cmg-migrate")]
#[command(version, about = "Migrate CMG MongoDB exports into the Bioloop schema", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the exported collections (overrides the config)
    #[arg(long, global = true, env = "CMG_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Target SQLite database (overrides the config)
    #[arg(long, global = true, env = "BIOLOOP_DB")]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the target schema
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Run every migration pass
    Migrate {
        /// Drop and recreate the target schema first
        #[arg(long)]
        reset: bool,
    },

    /// Show row counts of the target database
    Status,

    /// Compare source collection sizes with target row counts
    Verify,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            cli.log_json
                .then(|| fmt::layer().json().with_writer(LogWriterFactory::default())),
        )
        .with((!cli.log_json).then(|| fmt::layer().with_writer(LogWriterFactory::default())))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "cmg-migrate", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dump_dir) = cli.dump_dir {
        config.source.dump_dir = dump_dir;
    }
    if let Some(database) = cli.database {
        config.target.database = database;
    }

    let db = TargetDb::connect(&config).await?;

    match cli.command {
        Commands::Migrate { reset } => {
            let report = cmd_migrate(&config, &db, MigrateOptions { reset }).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Verify => {
            if !db.is_initialized().await? {
                return Err(Error::NotInitialized);
            }
            let report = cmd_verify(&config, &db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_verify(&report);
            }
            if !report.is_consistent() {
                db.close().await;
                std::process::exit(2);
            }
        }

        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),
    }

    db.close().await;
    Ok(())
}

async fn handle_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    // A config argument may name the file itself or the directory holding it
    let (base_dir, config_path) = if let Some(path) = config {
        if path.extension().is_some_and(|e| e == "toml") {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        } else {
            (path.clone(), path.join("config.toml"))
        }
    } else {
        let base = Config::default_base_dir();
        (base.clone(), base.join("config.toml"))
    };

    let config = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    println!("✓ cmg-migrate initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.target_database().display());
    println!("\nNext steps:");
    println!("  1. Point source.dump_dir at the mongoexport output");
    println!("  2. Review the role mapping in the config file");
    println!("  3. Run: cmg-migrate migrate");

    Ok(())
}

/// Load an explicit config file, or the default one when it exists
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}
