mod admin;
mod gateway;
mod texts;

use admin::FlagAction;
use clap::{Parser, Subcommand};
use evrika_channels::telegram::TelegramChannel;
use evrika_core::{
    account::Role,
    config,
    traits::{Channel, Provider, Storage},
};
use evrika_memory::{MessageFilter, Store, UserFilter};
use evrika_providers::YandexGptProvider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "evrika",
    version,
    about = "Evrika: a Telegram study helper backed by YandexGPT"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Check configuration and provider availability.
    Status,
    /// Ask the provider a one-shot question.
    Ask {
        /// The question to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// List users.
    Users {
        /// Match telegram id, username, first or last name.
        #[arg(short, long)]
        search: Option<String>,
        /// Only banned users.
        #[arg(long)]
        banned: bool,
        /// Only paid users.
        #[arg(long)]
        paid: bool,
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Ban users by telegram id.
    Ban {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Lift a ban.
    Unban {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Mark users as paid.
    Paid {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Mark users as free.
    Free {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// List transcript messages, newest first.
    Messages {
        /// Telegram id of the user.
        #[arg(short, long)]
        user: Option<i64>,
        /// "user" or "assistant".
        #[arg(short, long, value_parser = parse_role)]
        role: Option<Role>,
        /// Substring of the message text.
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Totals and the per-day usage series.
    Stats,
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("unknown role '{s}', expected user or assistant"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _guard = init_logging(&cfg, matches!(cli.command, Commands::Start))?;

    match cli.command {
        Commands::Start => {
            let provider = build_provider(&cfg)?;

            if !provider.is_available().await {
                anyhow::bail!(
                    "provider '{}' is not available. Set API_KEY and CATALOG_ID.",
                    provider.name()
                );
            }

            // Build channels.
            let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    let channel = TelegramChannel::new(tg.clone());
                    channels.insert("telegram".to_string(), Arc::new(channel));
                }
            }

            if channels.is_empty() {
                anyhow::bail!(
                    "No channels enabled. Set TELEGRAM_BOT_TOKEN or enable [channel.telegram]."
                );
            }

            let store: Arc<dyn Storage> = Arc::new(Store::new(&cfg.memory).await?);

            info!("{} starting...", cfg.evrika.name);
            let gw = Arc::new(gateway::Gateway::new(provider, channels, store));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{} status\n", cfg.evrika.name);
            println!("Config: {}", cli.config);
            println!("Default provider: {}", cfg.provider.default);
            println!("Database: {}", config::shellexpand(&cfg.memory.db_path));
            println!();

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "configured"
                    } else {
                        "missing API_KEY or CATALOG_ID"
                    }
                ),
                Err(e) => println!("  provider: {e}"),
            }

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no question provided. Usage: evrika ask <question>");
            }

            let question = message.join(" ");
            let provider = build_provider(&cfg)?;

            if !provider.is_available().await {
                anyhow::bail!(
                    "provider '{}' is not available. Set API_KEY and CATALOG_ID.",
                    provider.name()
                );
            }

            let answer = provider.complete(&question).await?;
            println!("{answer}");
        }
        Commands::Users {
            search,
            banned,
            paid,
            limit,
        } => {
            let store = Store::new(&cfg.memory).await?;
            let filter = UserFilter {
                search,
                banned: banned.then_some(true),
                paid: paid.then_some(true),
                limit,
            };
            admin::list_users(&store, &filter).await?;
        }
        Commands::Ban { ids } => flag(&cfg, FlagAction::Ban, &ids).await?,
        Commands::Unban { ids } => flag(&cfg, FlagAction::Unban, &ids).await?,
        Commands::Paid { ids } => flag(&cfg, FlagAction::Paid, &ids).await?,
        Commands::Free { ids } => flag(&cfg, FlagAction::Free, &ids).await?,
        Commands::Messages {
            user,
            role,
            search,
            limit,
        } => {
            let store = Store::new(&cfg.memory).await?;
            let filter = MessageFilter {
                external_id: user,
                role,
                search,
                limit,
            };
            admin::list_messages(&store, &filter).await?;
        }
        Commands::Stats => {
            let store = Store::new(&cfg.memory).await?;
            admin::stats(&store).await?;
        }
    }

    Ok(())
}

async fn flag(cfg: &config::Config, action: FlagAction, ids: &[i64]) -> anyhow::Result<()> {
    let store = Store::new(&cfg.memory).await?;
    admin::set_flag(&store, action, ids).await
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "yandexgpt" => Ok(Arc::new(YandexGptProvider::from_config(
            &cfg.provider.yandexgpt,
        ))),
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

/// Console logging to stderr, plus a daily rolling file under the data dir
/// when running the bot. The returned guard flushes the file on drop.
fn init_logging(cfg: &config::Config, to_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.evrika.log_level));

    let (file_layer, guard) = if to_file {
        let logs_dir = cfg.evrika.logs_dir();
        std::fs::create_dir_all(&logs_dir)?;
        let appender = tracing_appender::rolling::daily(&logs_dir, "evrika.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
