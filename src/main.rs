use bluos_scrobbler::{
    Alerter, Args, BluOsClient, Config, GotifyNotifier, LastFmAuth, LastFmClient, Notifier,
    ScrobbleBridge, ScrobbleQueue, Severity, WebhookNotifier,
};
use clap::Parser;
use log::info;
use std::time::Duration;

#[tokio::main]
async fn main() -> bluos_scrobbler::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!();
            eprintln!("Required environment variables:");
            eprintln!("  LASTFM_API_KEY=your_api_key");
            eprintln!("  LASTFM_API_SECRET=your_api_secret");
            eprintln!("and either:");
            eprintln!("  LASTFM_SESSION_KEY=your_session_key");
            eprintln!("or:");
            eprintln!("  LASTFM_USERNAME=your_username");
            eprintln!("  LASTFM_PASSWORD_MD5=md5_of_your_password");
            std::process::exit(1);
        }
    };
    config.apply(&args);

    let client = match &config.lastfm_auth {
        LastFmAuth::SessionKey(key) => {
            info!("Using Last.fm session key auth");
            LastFmClient::with_session(&config.lastfm_api_key, &config.lastfm_api_secret, key)?
        }
        LastFmAuth::Password {
            username,
            password_md5,
        } => {
            info!("Using Last.fm username + MD5 password auth");
            LastFmClient::authenticate(
                &config.lastfm_api_key,
                &config.lastfm_api_secret,
                username,
                password_md5,
            )
            .await?
        }
    };

    let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
    if let Some(webhook) = &config.webhook {
        sinks.push(Box::new(WebhookNotifier::new(
            &webhook.url,
            webhook.min_level,
            &config.app_tag,
        )?));
    }
    if let Some(gotify) = &config.gotify {
        sinks.push(Box::new(GotifyNotifier::new(
            &gotify.url,
            &gotify.token,
            gotify.min_level,
            gotify.priority,
            &config.app_tag,
        )?));
    }
    let alerter = Alerter::new(sinks);

    let queue = ScrobbleQueue::open(&config.queue_path, config.queue_capacity);
    let device = BluOsClient::new(&config.bluos_host, config.bluos_port)?;

    info!(
        "Starting BluOS → Last.fm bridge. Poll interval: {}s",
        config.poll_interval
    );
    info!(
        "BluOS device: {}:{} | Cache: {} (limit={}, size={})",
        config.bluos_host,
        config.bluos_port,
        config.queue_path.display(),
        config.queue_capacity,
        queue.size()
    );
    alerter
        .alert(
            Severity::Info,
            "Bridge started",
            &format!(
                "Polling {}:{}; cache path {}.",
                config.bluos_host,
                config.bluos_port,
                config.queue_path.display()
            ),
            None,
        )
        .await;

    let mut bridge = ScrobbleBridge::new(
        device,
        client,
        queue,
        alerter,
        Duration::from_secs(config.poll_interval),
    );

    tokio::select! {
        _ = bridge.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down…");
        }
    }

    Ok(())
}
