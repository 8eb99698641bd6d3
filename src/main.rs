//! tgwatch binary: authenticate, resolve the channel, poll until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tgwatch::auth::{AuthPath, Authenticator, StdinPrompt};
use tgwatch::config::Config;
use tgwatch::credentials::load_app_credentials;
use tgwatch::logging;
use tgwatch::poller::scheduler::PollerHandle;
use tgwatch::poller::{ConsoleSink, Poller, PollerSettings};
use tgwatch::resolver::resolve_channel;
use tgwatch::session::SessionStore;
use tgwatch::telegram::gateway::GatewayClient;
use tgwatch::telegram::TelegramApi;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(config.logs_dir.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %config.channel,
        gateway = %config.gateway_url,
        "tgwatch starting"
    );

    let credentials =
        load_app_credentials(&config.env_file).context("failed to load credentials")?;

    let api: Arc<dyn TelegramApi> = Arc::new(GatewayClient::new(
        config.gateway_url.clone(),
        credentials.api_id,
        credentials.api_hash.clone(),
        config.request_timeout(),
    ));
    let store = SessionStore::new(&config.session_path);

    let authorized = Authenticator::new(api.as_ref(), &store, &credentials.phone_number)
        .authorize(&StdinPrompt)
        .await
        .context("authorization failed")?;
    if authorized.path == AuthPath::FreshLogin {
        info!(user = %authorized.user, "authorized with a fresh login");
    }

    let channel = resolve_channel(api.as_ref(), &config.channel)
        .await
        .with_context(|| format!("failed to resolve channel {}", config.channel))?;

    let mut poller = Poller::new(
        Arc::clone(&api),
        channel,
        Arc::new(ConsoleSink),
        PollerSettings::from(&config),
    );
    poller
        .initialize()
        .await
        .context("failed to fetch initial messages")?;

    let handle = PollerHandle::start(poller, config.poll_interval());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received shutdown signal");

    handle.stop().await.context("poller task failed")?;
    info!("tgwatch shut down cleanly");
    Ok(())
}
