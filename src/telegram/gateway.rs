//! HTTP client for the MTProto gateway sidecar.
//!
//! Every call is a `POST {base_url}/call` carrying the method name, its
//! params, and the current session blob. The gateway answers with the raw
//! method result and, when the authorization changed, a replacement session.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    sanitize_error_body, ChannelHandle, Message, SentCode, Session, SessionUser, SignInOutcome,
    TelegramApi, TelegramError,
};

/// Default gateway address.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8081";

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Constructor used for the sign-up-required variant of `auth.signIn`.
const SIGN_UP_REQUIRED: &str = "auth.authorizationSignUpRequired";

/// Request envelope sent to the gateway.
#[derive(Serialize)]
struct CallRequest<'a> {
    method: &'a str,
    params: Value,
    session: Option<Value>,
}

/// Response envelope from the gateway.
#[derive(Deserialize)]
struct CallResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    session: Option<Value>,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    error_message: Option<String>,
}

/// A TL `long` as the gateway encodes it: a JSON number or a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLong {
    Number(i64),
    Text(String),
}

impl RawLong {
    fn into_i64(self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn deserialize_long<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    RawLong::deserialize(deserializer)?
        .into_i64()
        .ok_or_else(|| serde::de::Error::custom("expected an integer or a decimal string"))
}

fn deserialize_optional_long<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawLong>::deserialize(deserializer)?
        .map(|raw| {
            raw.into_i64()
                .ok_or_else(|| serde::de::Error::custom("expected an integer or a decimal string"))
        })
        .transpose()
}

/// Read a `long` field from an untyped object.
fn long_of(object: &Value, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
struct RawUser {
    #[serde(deserialize_with = "deserialize_long")]
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl From<RawUser> for SessionUser {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id,
            first_name: raw.first_name,
            username: raw.username,
        }
    }
}

#[derive(Deserialize)]
struct RawPeer {
    #[serde(default, deserialize_with = "deserialize_optional_long")]
    user_id: Option<i64>,
}

#[derive(Deserialize)]
struct RawMessage {
    id: i64,
    #[serde(default)]
    date: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    from_id: Option<RawPeer>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            timestamp: raw.date,
            text: raw.message,
            sender_id: raw.from_id.and_then(|peer| peer.user_id),
        }
    }
}

#[derive(Deserialize)]
struct HistoryResult {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

/// Client for the MTProto gateway.
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    api_id: i64,
    api_hash: String,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("api_id", &self.api_id)
            .field("api_hash", &"[REDACTED]")
            .finish()
    }
}

impl GatewayClient {
    /// Create a client for the gateway at `base_url`.
    ///
    /// `api_id` and `api_hash` identify the application and are forwarded
    /// with every call. `request_timeout` bounds each call end to end.
    pub fn new(
        base_url: impl Into<String>,
        api_id: i64,
        api_hash: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_id,
            api_hash: api_hash.into(),
            session: RwLock::new(None),
        }
    }

    /// Invoke a raw method and return its `result` object.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::Rpc`] when the gateway reports a platform
    /// error, [`TelegramError::HttpStatus`] for other non-success answers,
    /// and [`TelegramError::Parse`] when the envelope is malformed.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, TelegramError> {
        let url = format!("{}/call", self.base_url);
        let session = self.session.read().await.clone().map(|s| s.0);
        let body = CallRequest {
            method,
            params: with_app_credentials(params, self.api_id, &self.api_hash),
            session,
        };

        debug!(method, "gateway call");
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: CallResponse = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(TelegramError::Parse(format!("{method}: {e}")));
            }
            Err(_) => {
                return Err(TelegramError::HttpStatus {
                    status: status.as_u16(),
                    body: sanitize_error_body(&text),
                });
            }
        };

        if !envelope.ok || !status.is_success() {
            return match envelope.error_message {
                Some(message) => Err(TelegramError::Rpc {
                    code: envelope
                        .error_code
                        .unwrap_or_else(|| i32::from(status.as_u16())),
                    message,
                }),
                None => Err(TelegramError::HttpStatus {
                    status: status.as_u16(),
                    body: sanitize_error_body(&text),
                }),
            };
        }

        if let Some(session) = envelope.session {
            *self.session.write().await = Some(Session(session));
        }

        envelope
            .result
            .ok_or_else(|| TelegramError::Parse(format!("{method}: missing result")))
    }
}

/// Attach the application identity to a params object.
fn with_app_credentials(mut params: Value, api_id: i64, api_hash: &str) -> Value {
    if let Value::Object(map) = &mut params {
        map.insert("api_id".to_owned(), json!(api_id));
        map.insert("api_hash".to_owned(), json!(api_hash));
    }
    params
}

/// Read an access hash the gateway may encode either as a string or a number.
fn access_hash_of(chat: &Value) -> Option<String> {
    match chat.get("access_hash")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn input_peer_channel(channel: &ChannelHandle) -> Value {
    json!({
        "_": "inputPeerChannel",
        "channel_id": channel.id,
        "access_hash": channel.access_hash,
    })
}

#[async_trait]
impl TelegramApi for GatewayClient {
    async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn send_code(&self, phone: &str) -> Result<SentCode, TelegramError> {
        let result = self
            .call(
                "auth.sendCode",
                json!({
                    "phone_number": phone,
                    "settings": { "_": "codeSettings" },
                }),
            )
            .await?;

        let phone_code_hash = result
            .get("phone_code_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TelegramError::Parse("auth.sendCode: missing phone_code_hash".to_owned())
            })?;

        Ok(SentCode {
            phone_code_hash: phone_code_hash.to_owned(),
        })
    }

    async fn sign_in(
        &self,
        phone: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<SignInOutcome, TelegramError> {
        let result = self
            .call(
                "auth.signIn",
                json!({
                    "phone_number": phone,
                    "phone_code_hash": phone_code_hash,
                    "phone_code": code,
                }),
            )
            .await?;

        if result.get("_").and_then(Value::as_str) == Some(SIGN_UP_REQUIRED) {
            return Ok(SignInOutcome::SignUpRequired);
        }

        let user = result
            .get("user")
            .cloned()
            .ok_or_else(|| TelegramError::Parse("auth.signIn: missing user".to_owned()))?;
        let user: RawUser = serde_json::from_value(user)
            .map_err(|e| TelegramError::Parse(format!("auth.signIn: {e}")))?;

        Ok(SignInOutcome::Authorized(user.into()))
    }

    async fn get_self(&self) -> Result<SessionUser, TelegramError> {
        let result = self
            .call(
                "users.getFullUser",
                json!({ "id": { "_": "inputUserSelf" } }),
            )
            .await?;

        let user = result
            .get("users")
            .and_then(Value::as_array)
            .and_then(|users| users.first())
            .cloned()
            .ok_or_else(|| TelegramError::Parse("users.getFullUser: no users".to_owned()))?;
        let user: RawUser = serde_json::from_value(user)
            .map_err(|e| TelegramError::Parse(format!("users.getFullUser: {e}")))?;

        Ok(user.into())
    }

    async fn resolve_username(&self, alias: &str) -> Result<ChannelHandle, TelegramError> {
        let result = self
            .call("contacts.resolveUsername", json!({ "username": alias }))
            .await?;

        let chat = result
            .get("chats")
            .and_then(Value::as_array)
            .and_then(|chats| chats.first())
            .ok_or_else(|| TelegramError::NotFound(format!("no chat for alias {alias}")))?;

        let id = long_of(chat, "id").ok_or_else(|| {
            TelegramError::Parse("contacts.resolveUsername: chat without id".to_owned())
        })?;
        let access_hash = access_hash_of(chat).ok_or_else(|| {
            TelegramError::Parse("contacts.resolveUsername: chat without access_hash".to_owned())
        })?;

        Ok(ChannelHandle { id, access_hash })
    }

    async fn get_history(
        &self,
        channel: &ChannelHandle,
        limit: u32,
    ) -> Result<Vec<Message>, TelegramError> {
        let result = self
            .call(
                "messages.getHistory",
                json!({
                    "peer": input_peer_channel(channel),
                    "offset_id": 0,
                    "offset_date": 0,
                    "add_offset": 0,
                    "limit": limit,
                    "max_id": 0,
                    "min_id": 0,
                    "hash": 0,
                }),
            )
            .await?;

        let history: HistoryResult = serde_json::from_value(result)
            .map_err(|e| TelegramError::Parse(format!("messages.getHistory: {e}")))?;

        Ok(history.messages.into_iter().map(Message::from).collect())
    }
}
