//! viewtrack — Binary Entrypoint
//! Wires credentials, config, and collaborators, then runs one of three
//! modes: a single print-only collection pass (default), a pass that
//! also notifies (`--notify`), or the inbox listener loop (`--listen`).

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use viewtrack::backup::github::GithubBackup;
use viewtrack::chart::SvgChartRenderer;
use viewtrack::collect::Collector;
use viewtrack::config::{AppConfig, Credentials};
use viewtrack::listener::{run_listener, ListenerCfg};
use viewtrack::notify::telegram::TelegramNotifier;
use viewtrack::report::format_message;
use viewtrack::source::youtube::YouTubeSource;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("viewtrack=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let listen = args.iter().any(|a| a == "--listen");
    let notify = args.iter().any(|a| a == "--notify");

    let config = AppConfig::load_default()?;
    let creds = Credentials::from_env()?;

    let source = YouTubeSource::new(creds.youtube_api_key.clone())
        .with_max_pages(config.max_pages);

    let mut collector = Collector::new(config, Box::new(source))
        .with_renderer(Box::new(SvgChartRenderer::default()));
    if let Some(github) = creds.github.clone() {
        collector = collector.with_backup(Box::new(GithubBackup::new(github)));
    }

    let telegram = creds.telegram.clone();
    if let Some(tg) = &telegram {
        collector = collector.with_notifier(Box::new(TelegramNotifier::new(
            tg.bot_token.clone(),
            tg.chat_id.clone(),
        )));
    }

    if listen {
        let tg = telegram
            .ok_or_else(|| anyhow!("--listen requires TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID"))?;
        let notifier = TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id.clone());
        return run_listener(&collector, &notifier, &tg.bot_token, ListenerCfg::default()).await;
    }

    if notify {
        if telegram.is_none() {
            return Err(anyhow!(
                "--notify requires TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID"
            ));
        }
        collector.run_and_notify().await?;
        return Ok(());
    }

    let report = collector.run_once().await?;
    println!("{}", format_message(&report));
    Ok(())
}
