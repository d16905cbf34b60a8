use anyhow::Result;
use magni::{bot::Bot, config};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("magni=info")),
        )
        .init();

    // Load config, writing out the defaults on first run
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&path)?;
    if !path.exists() {
        config::save_config(&path, &cfg)?;
        info!("wrote default configuration to {}", path.display());
    }

    let mut bot = Bot::new(cfg.server.identity());
    bot.with_proxy(cfg.proxy.to_proxy())
        .with_options(cfg.connection.options());
    for channel in &cfg.server.channels {
        bot.join(channel);
    }

    bot.handler("!ping", |msg, out| async move {
        out.privmsg(&msg.channel, &format!("{}: pong", msg.nick))
            .await?;
        anyhow::Ok(())
    })
    .handler("!echo", |msg, out| async move {
        if !msg.args().is_empty() {
            out.privmsg(&msg.channel, msg.args()).await?;
        }
        anyhow::Ok(())
    })
    .handler("!version", |msg, out| async move {
        let version = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
        out.privmsg(&msg.channel, version).await?;
        anyhow::Ok(())
    });

    if let Err(e) = bot.run(&cfg.server.host, cfg.server.port).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
