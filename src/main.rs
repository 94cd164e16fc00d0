use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use urlsh::admin::{self, AdminCommands};
use urlsh::cli::{self, ClientArgs};
use urlsh::config::Config;
use urlsh::{render, server};

/// urlsh - URL shortener with visit insights
#[derive(Parser, Debug)]
#[command(name = "urlsh")]
#[command(version)]
#[command(about = "URL shortener with visit insights", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Server {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT env var)
        #[arg(long)]
        port: Option<u16>,

        /// Run migrations on startup
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        migrate: bool,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        admin_command: AdminCommands,
    },

    /// Talk to a running server
    Client(ClientArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    // stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Server {
            host,
            port,
            migrate,
        } => {
            let mut config = Config::from_env()?;

            // Override config with CLI args if provided
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr = format!("{}:{}", host, port);

            // Keep the derived base URL in step with the bound address
            if std::env::var("BASE_URL").is_err() {
                config.shortener.base_url = format!("http://{}:{}", host, port);
            }

            server::run_server(config, addr, migrate).await?;
        }
        Commands::Admin { admin_command } => {
            let config = Config::from_env()?;
            admin::run(config, admin_command).await?;
        }
        Commands::Client(args) => cli::run(args).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("{}", render::error(&format!("{:#}", e)));
        std::process::exit(1);
    }
}
