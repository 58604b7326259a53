use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "studydash", about = "Clinical study dashboard metrics")]
struct Cli {
    /// Database path (default: ~/.studydash/studydash.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the general information panel (patient counts, enrollment, status)
    General {
        /// Login of the requesting user
        #[arg(long, default_value = "cli")]
        user: String,
        /// Root scope pk (overrides the configured root_scope_pk)
        #[arg(long, value_name = "PK")]
        root_scope: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => studydash::Database::open_at(path).await?,
        None => studydash::Database::open().await?,
    };
    let dash = studydash::StudyDashboard::new(db);

    match cli.command {
        Commands::General {
            user,
            root_scope,
            json,
        } => {
            handle_general(&dash, &user, root_scope, json).await?;
        }
        Commands::Config { action } => {
            handle_config(&dash, action).await?;
        }
        Commands::Status => {
            print_status(&dash).await?;
        }
    }

    Ok(())
}

async fn handle_general(
    dash: &studydash::StudyDashboard,
    login: &str,
    root_scope: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let user = studydash::User::new(login);
    let root = match root_scope {
        Some(pk) => pk,
        None => dash.root_scope_pk().await?,
    };
    log::info!("Computing general information for scope {root}");

    let data = dash.general_information_for(root, &user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let width = data.iter().map(|d| d.label.len()).max().unwrap_or(0);
    println!("General Information (scope {root})");
    for d in &data {
        println!("  {:<width$}  {}", d.label, d.value);
    }
    Ok(())
}

async fn handle_config(
    dash: &studydash::StudyDashboard,
    action: ConfigAction,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dash.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dash.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dash.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(dash: &studydash::StudyDashboard) -> anyhow::Result<()> {
    let counts = dash.status().await?;
    let root = dash.root_scope_pk().await?;
    println!("Database Status");
    println!("  Scopes:            {} ({} deleted)", counts.scopes, counts.deleted_scopes);
    println!("  Events:            {}", counts.events);
    println!("  Workflow statuses: {}", counts.workflow_statuses);
    println!("  Root scope:        {root}");
    Ok(())
}
