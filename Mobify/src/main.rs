use mobconfig::Config;
use mobrelay::{RangeRelay, RelayConfigExt, RelayServerExt, RelayState};
use mobserver::{LoggingOptions, ServerBuilder};
use mobyoutube::{MemoryImportSink, YoutubeClient, YoutubeConfigExt, YoutubeServerExt, YoutubeState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et logs ==========

    // Premier argument : répertoire de configuration (sinon MOBIFY_CONFIG, .mobify, ~/.mobify)
    let config_dir = std::env::args().nth(1).unwrap_or_default();
    let config = Config::load_config(&config_dir)?;

    let mut server = ServerBuilder::from_config(&config).build();
    server
        .init_logging(&LoggingOptions::from_config(&config))
        .await?;

    if let Some(dir) = config.directory() {
        info!(config_dir = %dir.display(), "Configuration loaded");
    }

    // ========== PHASE 2 : Services ==========

    // Construits une seule fois, partagés par tous les handlers
    let youtube = YoutubeClient::from_config(&config);
    info!(
        ytdlp = %config.get_ytdlp_path(),
        workers = config.get_worker_pool_size(),
        cache_ttl = ?config.get_resolution_cache_ttl(),
        "YouTube resolver ready"
    );

    let sink = Arc::new(MemoryImportSink::new());
    let youtube_state = YoutubeState::new(youtube.clone(), sink, config.get_import_concurrency());
    let relay = RangeRelay::new(youtube, config.get_relay_options())?;

    server
        .add_route("/", || async {
            serde_json::json!({"message": "Mobify API is running"})
        })
        .await;
    server.init_youtube(youtube_state).await;
    server.init_relay(RelayState::new(relay)).await;

    // ========== PHASE 3 : Démarrage du serveur ==========

    let addr = server.start().await?;
    let identity = server.info();
    info!(
        name = %identity.name,
        base_url = %identity.base_url,
        port = identity.http_port,
        %addr,
        "Mobify is ready, press Ctrl+C to stop"
    );
    server.wait().await;

    info!("Mobify stopped");
    Ok(())
}
