use async_trait::async_trait;
use clap::{Parser, Subcommand};
use quip::channels::{AnswerChannel, ChannelError, ChannelRegistry, InboundMessage, TelegramChannel};
use quip::localization::CatalogLocalizer;
use quip::server::GameServer;
use quip::session::InMemorySessionStore;
use quip::{ControllerRegistry, GameAnswer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const CONSOLE_CHANNEL_ID: &str = "console";

#[derive(Parser)]
#[command(name = "quip")]
#[command(about = "Quip CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, bundled locale catalogs).
    Init {
        /// Config file path (default: QUIP_CONFIG_PATH or ~/.quip/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Check that every locale defines every phrase the starter game uses. Exits non-zero when something is missing.
    Check {
        /// Config file path (default: QUIP_CONFIG_PATH or ~/.quip/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Play the starter game in the terminal.
    Chat {
        /// Config file path (default: QUIP_CONFIG_PATH or ~/.quip/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Player locale (default from config, usually "en").
        #[arg(long, short, value_name = "TAG")]
        locale: Option<String>,
    },

    /// Serve the starter game on Telegram (long polling) until Ctrl+C.
    Run {
        /// Config file path (default: QUIP_CONFIG_PATH or ~/.quip/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("quip {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => match run_check(config) {
            Ok(true) => {}
            Ok(false) => std::process::exit(2),
            Err(e) => {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Chat { config, locale }) => {
            if let Err(e) = run_chat(config, locale).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_server(config).await {
                log::error!("run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(quip::config::default_config_path);
    let dir = quip::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Catalog from the configured locales directory when it exists, otherwise the bundled one.
fn load_catalog(config: &quip::config::Config, path: &std::path::Path) -> anyhow::Result<CatalogLocalizer> {
    let default_locale = config.localization.default_locale.clone();
    let dir = quip::config::resolve_locales_dir(config, path);
    if dir.is_dir() {
        log::info!("loading locales from {}", dir.display());
        CatalogLocalizer::load_dir(&dir, default_locale)
    } else {
        log::info!("locales directory {} not found, using bundled locales", dir.display());
        quip::init::bundled_catalog(&default_locale)
    }
}

/// (locale, paths) pairs the starter game needs but the catalog lacks, each logged as a warning.
fn report_missing(
    catalog: &CatalogLocalizer,
    registry: &ControllerRegistry,
) -> BTreeMap<String, Vec<String>> {
    let missing = catalog.missing_paths(registry.localization_paths());
    for (locale, paths) in &missing {
        log::warn!("locale {} is missing {}", locale, paths.join(", "));
    }
    missing
}

fn run_check(config_path: Option<PathBuf>) -> anyhow::Result<bool> {
    let (config, path) = quip::config::load_config(config_path)?;
    let catalog = load_catalog(&config, &path)?;
    let registry = quip::starter::registry()?;
    let missing = report_missing(&catalog, &registry);
    if !missing.is_empty() {
        for (locale, paths) in &missing {
            println!("{}: missing {}", locale, paths.join(", "));
        }
        return Ok(false);
    }
    let locales: Vec<&str> = catalog.locales().collect();
    println!(
        "ok: {} controllers, {} phrase paths, locales: {}",
        registry.names().len(),
        registry.localization_paths().len(),
        locales.join(", ")
    );
    Ok(true)
}

/// Prints answers to the terminal, suggestions in brackets.
struct ConsoleChannel;

#[async_trait]
impl AnswerChannel for ConsoleChannel {
    async fn answer(&self, answer: GameAnswer) -> Result<(), ChannelError> {
        println!("< {}", answer.text.trim());
        if !answer.suggestions.is_empty() {
            println!("  [{}]", answer.suggestions.join(" | "));
        }
        Ok(())
    }
}

async fn run_chat(config_path: Option<PathBuf>, locale: Option<String>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = quip::config::load_config(config_path)?;
    let catalog = Arc::new(load_catalog(&config, &path)?);
    report_missing(&catalog, &quip::starter::registry()?);

    let channels = Arc::new(ChannelRegistry::new());
    channels
        .register(CONSOLE_CHANNEL_ID, Arc::new(ConsoleChannel))
        .await;
    let dispatcher = quip::starter::dispatcher(catalog, channels)?;
    let server = GameServer::new(
        Arc::new(dispatcher),
        Arc::new(InMemorySessionStore::new()),
        config.localization.default_locale.clone(),
    );

    let conversation_id = uuid::Uuid::new_v4().to_string();
    println!("type /exit to quit");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let msg = InboundMessage {
            channel_id: CONSOLE_CHANNEL_ID.to_string(),
            conversation_id: conversation_id.clone(),
            text: input.to_string(),
            locale: locale.clone(),
        };
        match server.handle_inbound(msg).await {
            Ok(Some(_)) => {}
            Ok(None) => println!("< ..."),
            Err(e) => eprintln!("chat error: {:#}", e),
        }
    }

    Ok(())
}

async fn run_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = quip::config::load_config(config_path)?;
    quip::init::require_initialized(&path, &config)?;
    let catalog = Arc::new(load_catalog(&config, &path)?);
    if !report_missing(&catalog, &quip::starter::registry()?).is_empty() {
        log::warn!("some phrases are missing; players in those locales get the default locale");
    }

    let token = quip::config::resolve_telegram_token(&config).ok_or_else(|| {
        anyhow::anyhow!("no Telegram bot token; set TELEGRAM_BOT_TOKEN or channels.telegram.botToken")
    })?;
    let telegram = Arc::new(TelegramChannel::new(Some(token)));

    let channels = Arc::new(ChannelRegistry::new());
    channels
        .register(quip::channels::TELEGRAM_CHANNEL_ID, telegram.clone())
        .await;
    let dispatcher = quip::starter::dispatcher(catalog, channels)?;
    let server = Arc::new(
        GameServer::new(
            Arc::new(dispatcher),
            Arc::new(InMemorySessionStore::new()),
            config.localization.default_locale.clone(),
        )
        .with_queue_capacity(config.server.inbound_buffer)
        .with_worker_idle(Duration::from_secs(config.server.worker_idle_secs)),
    );

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(config.server.inbound_buffer.max(1));
    let poller = telegram.clone().start_inbound(inbound_tx);
    let worker = server.run(inbound_rx);
    log::info!("telegram channel registered and getUpdates loop started");
    println!("serving on telegram; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received, stopping telegram poller and finishing queued turns");
    telegram.stop();
    if let Err(e) = poller.await {
        log::warn!("telegram poller ended abnormally: {}", e);
    }
    if let Err(e) = worker.await {
        log::warn!("game server ended abnormally: {}", e);
    }
    Ok(())
}
