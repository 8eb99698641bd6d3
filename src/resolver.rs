//! Channel alias resolution.

use tracing::{debug, info};

use crate::telegram::{ChannelHandle, TelegramApi, TelegramError};

/// Strip a leading `@` and surrounding whitespace from an alias.
pub fn normalize_alias(alias: &str) -> &str {
    alias.trim().trim_start_matches('@')
}

/// Resolve `alias` to the channel id and access hash used by history calls.
///
/// Makes a single lookup; there is no retry.
///
/// # Errors
///
/// Returns [`TelegramError::NotFound`] for an empty or unknown alias and
/// propagates any remote failure.
pub async fn resolve_channel(
    api: &dyn TelegramApi,
    alias: &str,
) -> Result<ChannelHandle, TelegramError> {
    let alias = normalize_alias(alias);
    if alias.is_empty() {
        return Err(TelegramError::NotFound("empty channel alias".to_owned()));
    }

    let channel = api.resolve_username(alias).await?;
    info!(alias, channel_id = channel.id, "channel resolved");
    debug!(alias, access_hash = %channel.access_hash, "channel access hash");
    Ok(channel)
}
