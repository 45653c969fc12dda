use std::sync::Arc;

use clap::{Parser, Subcommand};
use gatehouse::authz::loader::load_tables;
use gatehouse::authz::store::PermissionStore;
use gatehouse::authz::Tables;
use gatehouse::backend::HttpBackend;
use gatehouse::errors::GatehouseError;
use gatehouse::identity::FileIdentityStore;
use gatehouse::{settings, web};
use miette::Result;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Role-based permission resolution for the operations console"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Fetch permissions once and print a single access decision
    Check {
        module: String,
        #[arg(default_value = "view")]
        action: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    let tables = match &settings.authz.tables_dir {
        Some(dir) => load_tables(dir)?,
        None => Tables::builtin(),
    };
    let tables = Arc::new(tables);

    let backend = HttpBackend::new(&settings.backend)?;
    let store = Arc::new(PermissionStore::new(
        Arc::new(FileIdentityStore::new(&settings.identity.marker_path)),
        Arc::new(backend),
        Arc::new(tables.aliases.clone()),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => web::serve(settings, store, tables).await?,
        Command::Check { module, action } => {
            store.fetch_permissions().await;
            let snapshot = store.snapshot();
            let report = json!({
                "module": module,
                "action": action,
                "allowed": snapshot.can_access(&module, &action),
                "is_logged_in": snapshot.is_logged_in,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(GatehouseError::from)?
            );
        }
    }
    Ok(())
}
