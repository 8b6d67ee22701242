use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mr")]
#[command(about = "milkrun operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Materialize every active customer's order for one delivery date.
    Generate {
        /// Delivery date (YYYY-MM-DD). Defaults to tomorrow in the configured timezone.
        #[arg(long)]
        date: Option<String>,

        /// Layered config paths in merge order. Built-in defaults when omitted.
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Show what a customer would receive and pay, without charging them.
    Preview {
        /// Customer id
        #[arg(long)]
        customer: String,

        /// Delivery date (YYYY-MM-DD). Defaults to tomorrow.
        #[arg(long)]
        date: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Total quantity per product scheduled for one delivery date.
    Procurement {
        /// Delivery date (YYYY-MM-DD). Defaults to tomorrow.
        #[arg(long)]
        date: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = mr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = mr_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    mr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Generate { date, config_paths } => {
            commands::deliveries::generate(date.as_deref(), &config_paths).await?;
        }

        Commands::Preview {
            customer,
            date,
            config_paths,
        } => {
            commands::deliveries::preview(&customer, date.as_deref(), &config_paths).await?;
        }

        Commands::Procurement { date, config_paths } => {
            commands::deliveries::procurement(date.as_deref(), &config_paths).await?;
        }
    }

    Ok(())
}

// Logs go to stderr; stdout carries the key=value report.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
