//! `urlsh client` commands: drive the view-models against a running API.

use crate::client::UrlShortenerClient;
use crate::config::ClientConfig;
use crate::form::{ShortenForm, StatsView};
use crate::models::{Method, UtmParams};
use crate::render;
use anyhow::{bail, Context};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// API base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: ClientCommands,
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Shorten a URL
    Shorten {
        url: String,

        /// CUSTOM, RANDOM, HASH or SECURE
        #[arg(long, default_value_t = Method::Random)]
        method: Method,

        /// Custom alias, used with --method custom
        #[arg(long)]
        alias: Option<String>,

        /// Lifetime of the link; the server default applies when omitted
        #[arg(long)]
        expires_in_hours: Option<i64>,

        #[command(flatten)]
        utm: UtmArgs,
    },

    /// Show statistics for a short code
    Stats { code: String },

    /// Find a link by short URL or short code
    Find { query: String },

    /// Record a visit, then show the updated statistics
    Visit { code: String },

    /// Show last access, top user agents and unique IPs
    Insights { code: String },

    /// List the shortening methods
    Methods,
}

#[derive(Args, Debug, Default)]
pub struct UtmArgs {
    #[arg(long)]
    pub utm_source: Option<String>,
    #[arg(long)]
    pub utm_medium: Option<String>,
    #[arg(long)]
    pub utm_campaign: Option<String>,
    #[arg(long)]
    pub utm_term: Option<String>,
    #[arg(long)]
    pub utm_content: Option<String>,
}

impl From<UtmArgs> for UtmParams {
    fn from(args: UtmArgs) -> Self {
        UtmParams {
            utm_source: args.utm_source,
            utm_medium: args.utm_medium,
            utm_campaign: args.utm_campaign,
            utm_term: args.utm_term,
            utm_content: args.utm_content,
        }
    }
}

/// Run a client command and print its outcome.
pub async fn run(args: ClientArgs) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }

    let api = UrlShortenerClient::from_config(&config)
        .with_context(|| format!("Failed to create API client for {}", config.api_url))?;

    match args.command {
        ClientCommands::Shorten {
            url,
            method,
            alias,
            expires_in_hours,
            utm,
        } => {
            let expiration = expires_in_hours.map(expiration_in).transpose()?;

            let mut form = ShortenForm {
                url,
                method,
                alias: alias.unwrap_or_default(),
                expiration,
                utm: utm.into(),
                ..Default::default()
            };

            form.submit(&api).await;

            if let Some(error) = form.error {
                bail!(error);
            }
            if let Some(link) = &form.link {
                println!("{}", render::success("URL shortened"));
                println!("{}", render::link(link));
            }
        }
        ClientCommands::Stats { code } => {
            let mut view = StatsView::new();
            view.load(&api, &code).await;
            print_view(&view)?;
        }
        ClientCommands::Find { query } => {
            let mut view = StatsView::new();
            view.find(&api, &query).await;
            if view.link.is_none() && view.error.is_none() {
                bail!("Please enter a short URL or code to search");
            }
            print_view(&view)?;
        }
        ClientCommands::Visit { code } => {
            let mut view = StatsView::new();
            view.visit(&api, &code).await;
            print_view(&view)?;
        }
        ClientCommands::Insights { code } => {
            let mut view = StatsView::new();
            view.load(&api, &code).await;
            if view.error.is_none() {
                view.load_insights(&api).await;
            }
            if let Some(error) = view.error {
                bail!(error);
            }
            println!("{}", render::insights(&view));
        }
        ClientCommands::Methods => {
            print!("{}", render::methods());
        }
    }

    Ok(())
}

/// Point in time `hours` from now.
fn expiration_in(hours: i64) -> anyhow::Result<DateTime<Utc>> {
    if hours < 1 {
        bail!("--expires-in-hours must be at least 1, got {}", hours);
    }

    TimeDelta::try_hours(hours)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .with_context(|| format!("--expires-in-hours {} is out of range", hours))
}

fn print_view(view: &StatsView) -> anyhow::Result<()> {
    if let Some(error) = &view.error {
        bail!(error.clone());
    }
    if let Some(link) = &view.link {
        println!("{}", render::link(link));
    }
    Ok(())
}
