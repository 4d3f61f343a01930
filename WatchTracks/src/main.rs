use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wttracker::{
    DispatchPolicy, Dispatcher, PlaylistId, PlaylistWatcher, SnapshotStore, SubscriberRegistry,
    WatcherConfig,
};
use wttelegram::TelegramClient;
use wtytmusic::YtMusicClient;

mod artwork;
mod commands;
mod health;

use artwork::ArtworkClient;
use commands::CommandHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ========== PHASE 1 : Configuration ==========

    let config = wtconfig::get_config();
    let bot_token = config.get_bot_token()?;
    let default_playlist = PlaylistId::parse(&config.get_default_playlist()?)?;
    let storage_path = config.get_storage_path()?;
    info!(
        playlist = %default_playlist,
        storage = %storage_path,
        "Configuration loaded"
    );

    // ========== PHASE 2 : Transports ==========

    info!("🎵 Connecting to YouTube Music...");
    let mut ytmusic_builder = YtMusicClient::builder();
    if let Some(auth_file) = config.get_ytmusic_auth_file() {
        info!(auth_file = %auth_file, "Using browser authentication");
        ytmusic_builder = ytmusic_builder.auth_file(Path::new(&auth_file))?;
    }
    let ytmusic = Arc::new(ytmusic_builder.build()?);

    info!("📡 Connecting to Telegram...");
    let telegram = Arc::new(TelegramClient::new(bot_token)?);
    let me = telegram.get_me().await?;
    let bot_username = me.username.unwrap_or_else(|| me.first_name.clone());
    info!(bot = %bot_username, "✅ Telegram bot authorized");

    let artwork: Arc<dyn wttracker::ArtworkFetch> = Arc::new(ArtworkClient::new(
        Duration::from_secs(config.get_artwork_timeout()?),
    )?);

    // ========== PHASE 3 : Tracking engine ==========

    let store = SnapshotStore::new(Path::new(&storage_path))?;
    let registry = SubscriberRegistry::new(Path::new(&storage_path))?;

    let policy = DispatchPolicy {
        send_spacing: Duration::from_millis(config.get_send_spacing_ms()?),
        artwork_timeout: Duration::from_secs(config.get_artwork_timeout()?),
    };
    let dispatcher = Dispatcher::new(telegram.clone(), artwork.clone(), policy);

    let watcher_config = WatcherConfig::new(default_playlist)
        .check_interval(Duration::from_secs(config.get_check_interval()?))
        .cycle_deadline(Duration::from_secs(config.get_cycle_deadline()?));
    let watcher = PlaylistWatcher::new(ytmusic, store, registry, dispatcher, watcher_config);

    // ========== PHASE 4 : Services ==========

    let http_port = config.get_http_port();
    tokio::spawn(async move {
        if let Err(e) = health::serve(http_port).await {
            tracing::error!(error = %e, "Health endpoint failed");
        }
    });

    let handler = CommandHandler::new(
        telegram.clone(),
        watcher.clone(),
        artwork,
        bot_username,
    );
    tokio::spawn(handler.run());

    watcher.spawn_periodic();

    info!("✅ WatchTracks is ready!");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
