use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Text};
use std::{path::PathBuf, sync::Arc};
use weather_core::{
    Config, FileStore, GateError, QuotaStatus, SystemClock, WeatherGate, WeatherView,
    provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Cached, quota-guarded current weather")]
pub struct Cli {
    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the provider key, access keys and hourly limit.
    Configure,

    /// Show current weather for a city.
    Show {
        city: String,
        country: String,

        /// Access key the request is made with.
        #[arg(long)]
        key: String,

        #[arg(long)]
        json: bool,
    },

    /// List stored observations, newest first.
    History {
        #[command(subcommand)]
        by: HistoryBy,

        #[arg(long, global = true)]
        json: bool,
    },

    /// Show how much of the hourly quota an access key has used.
    Quota {
        #[arg(long)]
        key: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum HistoryBy {
    /// Observations recorded for a location.
    Location { city: String, country: String },

    /// Observations fetched on behalf of an access key.
    Key { key: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        let config = Config::load_from(&config_path)?;
        tracing::debug!(path = %config_path.display(), "loaded configuration");

        match self.command {
            Command::Configure => configure(config, &config_path),
            Command::Show { city, country, key, json } => {
                let gate = build_gate(&config).await?;
                let view = gate.get_weather(&city, &country, &key).await.map_err(|e| {
                    let unconfigured = matches!(e, GateError::UpstreamUnavailable)
                        && !config.is_provider_configured();
                    let err = describe(e, &format!("Could not get weather for {city}, {country}"));
                    if unconfigured {
                        err.context(
                            "No fresh cached observation and no weather provider key.\n \
                             Hint: run `weather configure` and enter your OpenWeatherMap API key.",
                        )
                    } else {
                        err
                    }
                })?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                } else {
                    print_view(&view);
                }
                Ok(())
            }
            Command::History { by, json } => {
                let gate = build_gate(&config).await?;
                let views = match by {
                    HistoryBy::Location { city, country } => {
                        gate.history_for_location(&city, &country).await
                    }
                    HistoryBy::Key { key } => gate.history_for_credential(&key).await,
                }
                .map_err(|e| describe(e, "Could not read history"))?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&views)?);
                } else if views.is_empty() {
                    println!("No observations recorded.");
                } else {
                    for view in &views {
                        print_view(view);
                    }
                }
                Ok(())
            }
            Command::Quota { key, json } => {
                let gate = build_gate(&config).await?;
                let status =
                    gate.quota_status(&key).await.map_err(|e| describe(e, "Could not read quota"))?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    print_quota(&status);
                }
                Ok(())
            }
        }
    }
}

/// Gate over the on-disk store. Without a provider key only fresh cached
/// observations can be served, which history and quota never need anyway.
async fn build_gate(config: &Config) -> Result<WeatherGate> {
    let store = Arc::new(open_store(config).await?);
    let provider = if config.is_provider_configured() {
        Some(provider_from_config(config)?)
    } else {
        tracing::debug!("no provider key configured, cache misses will fail");
        None
    };
    Ok(WeatherGate::from_config(config, provider, store, Arc::new(SystemClock)))
}

async fn open_store(config: &Config) -> Result<FileStore> {
    let path = config.store_file_path()?;
    let store = FileStore::open(&path)
        .await
        .with_context(|| format!("Failed to open store: {}", path.display()))?;
    tracing::debug!(path = %store.path().display(), "opened store");
    Ok(store)
}

fn describe(err: GateError, what: &str) -> anyhow::Error {
    let kind = err.kind();
    let status = err.status_code();
    anyhow::Error::new(err).context(format!("{what} [{kind}, status {status}]"))
}

fn configure(mut config: Config, path: &std::path::Path) -> Result<()> {
    let provider_key = Password::new("OpenWeatherMap API key (leave empty to keep current):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    if !provider_key.trim().is_empty() {
        config.set_provider_api_key(provider_key.trim().to_string());
    }

    let access_key = Text::new("Access key to allow (leave empty to skip):").prompt()?;
    if !access_key.trim().is_empty() && !config.add_access_key(access_key.trim().to_string()) {
        println!("Access key is already allowed.");
    }

    config.access.requests_per_hour = CustomType::<u32>::new("Requests per hour per access key:")
        .with_default(config.access.requests_per_hour)
        .prompt()?;

    config.save_to(path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn print_view(view: &WeatherView) {
    println!(
        "{}, {}: {} ({}) [condition {}, icon {}] observed {} UTC via {}",
        view.city,
        view.country,
        view.category,
        view.description,
        view.condition_id,
        view.icon,
        view.observed_at,
        view.credential,
    );
}

fn print_quota(status: &QuotaStatus) {
    println!(
        "{}: {}/{} requests used, {} remaining; window resets at {}",
        status.credential,
        status.used,
        status.limit,
        status.remaining,
        status.resets_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
}
