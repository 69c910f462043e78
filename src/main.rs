mod config;
mod engine;
mod extractor;
mod firewall;
mod notifier;
mod state;

use anyhow::{Result, bail};
use linemux::MuxedLines;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-v" || a == "--version") {
        println!("torrent-sentinel {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let config_path = args
        .iter()
        .position(|a| a == "-c")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "config.yaml".to_string());

    // ufw refuses non-root callers, so fail early
    if unsafe { libc::geteuid() } != 0 {
        log::error!("❌ CRITICAL: Run this application with SUDO/ROOT!");
        std::process::exit(1);
    }

    let config = Arc::new(config::Config::load(&config_path)?);

    log::info!("🚀 torrent-sentinel {}", env!("CARGO_PKG_VERSION"));
    log::info!("Service started on {}", config.hostname);

    let firewall: Arc<dyn firewall::Firewall> = match config.block_mode.as_str() {
        "ufw" => Arc::new(firewall::Ufw::new()),
        other => bail!("unsupported block mode: {}", other),
    };

    let (outbound, rx) = notifier::channel();
    tokio::spawn(notifier::run(rx));

    let store = Arc::new(state::BanStore::new());
    let engine = engine::Engine::new(store, firewall, outbound, Arc::clone(&config));

    // seeds the store from the firewall right away, then ticks forever
    tokio::spawn(engine.clone().run_resync());

    let extractor = extractor::Extractor::new(
        config.torrent_tag.clone(),
        config.tid_regex.clone(),
        config.username_regex.clone(),
    );

    // Linemux follows the file across rotation and truncation, and starts
    // tailing once the file appears if it does not exist yet.
    let mut lines = MuxedLines::new()?;
    lines.add_file(&config.log_file).await?;
    log::info!("📂 Monitoring Log: {}", config.log_file);

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(event) = extractor.extract(line.line()) {
            engine.handle_event(event);
        }
    }

    Ok(())
}
