use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use guild_tunes::{
    audio::{PlayerRegistry, SongbirdSink},
    bot::TunesBot,
    config::Config,
    logging,
    sources::YtDlpResolver,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar configuración
    let config = Config::load()?;

    // Inicializar logging
    logging::init(config.log_file.as_deref())?;

    info!("🎵 Iniciando Guild Tunes v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let manager = Songbird::serenity();
    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.ytdlp_cookies.clone(),
        config.resolver_concurrency,
    ));
    let sink = Arc::new(SongbirdSink::new(manager.clone())?);
    let registry = Arc::new(PlayerRegistry::new(resolver, sink, config.player.clone()));

    let handler = TunesBot::new(registry, config.command_prefixes.clone());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no disponible en {}", config.ytdlp_path.display());
    }
}
