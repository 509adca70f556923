//! Nacos configuration service client (v1 Open API over HTTP).

use super::RemoteSource;
use crate::core::{ConfigFormat, ConfigKey};
use crate::error::{ConfigError, Result};
use crate::settings::{ClientSettings, ServerAddr};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

const CONFIGS_PATH: &str = "/v1/cs/configs";
const LISTENER_PATH: &str = "/v1/cs/configs/listener";
const LOGIN_PATH: &str = "/v1/auth/login";

/// Upper bound on how long a token is trusted, whatever the server claims.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

const WORD_SEPARATOR: char = '\u{2}';
const LINE_SEPARATOR: char = '\u{1}';

/// Access token issued by `/v1/auth/login`.
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "tokenTtl", default)]
    token_ttl: u64,
}

/// Nacos-backed [`RemoteSource`].
///
/// Talks to one or more Nacos servers over HTTP. Requests start at the last
/// server that answered and fall through to the next one on transport errors.
/// When credentials are configured a token is obtained from the login
/// endpoint and refreshed before it expires.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config::settings::ClientSettings;
/// use nacos_config::sources::{NacosSource, RemoteSource};
/// use nacos_config::core::ConfigKey;
///
/// # async fn example() -> nacos_config::error::Result<()> {
/// let source = NacosSource::from_settings(&ClientSettings::new("10.0.0.5"))?;
/// let key = ConfigKey::new("prod", "orders", "DEFAULT_GROUP")?;
/// let content = source.fetch(&key).await?;
/// # Ok(())
/// # }
/// ```
pub struct NacosSource {
    client: Client,
    servers: Vec<ServerAddr>,
    scheme: String,
    context_path: String,
    api_base: Option<String>,
    credentials: Option<(String, String)>,
    token: RwLock<Option<AccessToken>>,
    current: AtomicUsize,
    timeout: Duration,
    long_poll_timeout: Duration,
}

impl NacosSource {
    /// Create a source from client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client
    /// cannot be constructed.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        settings.validate()?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConfigError::RemoteError(format!("Failed to create HTTP client: {}", e)))?;

        let context_path = normalize_context_path(&settings.context_path);
        let api_base = settings
            .api_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(|host| format!("{}{}", host.trim_end_matches('/'), context_path));

        let credentials = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            servers: settings.servers()?,
            scheme: settings.scheme.clone(),
            context_path,
            api_base,
            credentials,
            token: RwLock::new(None),
            current: AtomicUsize::new(0),
            timeout: settings.timeout(),
            long_poll_timeout: settings.long_poll_timeout(),
        })
    }

    fn base_url(&self, server: &ServerAddr) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, server.host, server.port, self.context_path
        )
    }

    /// Send a request to the first server that accepts it.
    async fn send_with_failover<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let count = self.servers.len();
        let start = self.current.load(Ordering::Relaxed);
        let mut last_error = None;

        for offset in 0..count {
            let index = (start + offset) % count;
            let base = self.base_url(&self.servers[index]);
            match build(&base).send().await {
                Ok(response) => {
                    self.current.store(index, Ordering::Relaxed);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(server = %base, error = %e, "nacos server unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(ConfigError::RemoteError(match last_error {
            Some(e) => format!("All nacos servers failed, last error: {}", e),
            None => "No nacos servers configured".to_string(),
        }))
    }

    /// Current access token, logging in first when needed.
    async fn access_token(&self) -> Result<Option<String>> {
        let Some((username, password)) = &self.credentials else {
            return Ok(None);
        };

        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                if Instant::now() < token.refresh_at {
                    return Ok(Some(token.value.clone()));
                }
            }
        }

        let mut token = self.token.write().await;
        if let Some(existing) = token.as_ref() {
            if Instant::now() < existing.refresh_at {
                return Ok(Some(existing.value.clone()));
            }
        }

        let response = self
            .send_with_failover(|base| {
                self.client
                    .post(format!("{}{}", base, LOGIN_PATH))
                    .form(&[("username", username.as_str()), ("password", password.as_str())])
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfigError::AuthError(format!(
                "login returned status {}: {}",
                status, body
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ConfigError::AuthError(format!("Invalid login response: {}", e)))?;

        debug!(ttl_secs = login.token_ttl, "obtained nacos access token");
        *token = Some(AccessToken {
            value: login.access_token.clone(),
            refresh_at: refresh_deadline(Instant::now(), login.token_ttl),
        });

        Ok(Some(login.access_token))
    }

    async fn status_error(&self, response: Response) -> ConfigError {
        let status = response.status();
        if status == StatusCode::FORBIDDEN && self.credentials.is_some() {
            *self.token.write().await = None;
        }
        let body = response.text().await.unwrap_or_default();
        ConfigError::RemoteStatus {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl RemoteSource for NacosSource {
    async fn fetch(&self, key: &ConfigKey) -> Result<String> {
        let token = self.access_token().await?;

        let response = self
            .send_with_failover(|base| {
                let request = self
                    .client
                    .get(format!("{}{}", base, CONFIGS_PATH))
                    .query(&[
                        ("dataId", key.data_id()),
                        ("group", key.group()),
                        ("tenant", key.namespace_id()),
                    ]);
                with_token(request, token.as_deref())
            })
            .await?;

        match response.status() {
            status if status.is_success() => {
                let content = response.text().await.map_err(|e| {
                    ConfigError::RemoteError(format!("Failed to read config body: {}", e))
                })?;
                debug!(key = %key, bytes = content.len(), "fetched remote config");
                Ok(content)
            }
            StatusCode::NOT_FOUND => Err(ConfigError::NotFound {
                namespace_id: key.namespace_id().to_string(),
                data_id: key.data_id().to_string(),
                group: key.group().to_string(),
            }),
            _ => Err(self.status_error(response).await),
        }
    }

    async fn poll_changes(&self, key: &ConfigKey, content_md5: &str) -> Result<bool> {
        let token = self.access_token().await?;
        let listening = listening_configs(key, content_md5);
        let hold_ms = self.long_poll_timeout.as_millis().to_string();

        let response = self
            .send_with_failover(|base| {
                let request = self
                    .client
                    .post(format!("{}{}", base, LISTENER_PATH))
                    .header("Long-Pulling-Timeout", hold_ms.as_str())
                    .timeout(self.long_poll_timeout + self.timeout)
                    .form(&[("Listening-Configs", listening.as_str())]);
                with_token(request, token.as_deref())
            })
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let body = response.text().await.map_err(|e| {
            ConfigError::RemoteError(format!("Failed to read listener response: {}", e))
        })?;

        Ok(changed_keys(&body)?.iter().any(|(data_id, group, tenant)| {
            data_id == key.data_id() && group == key.group() && tenant == key.namespace_id()
        }))
    }

    async fn publish(&self, key: &ConfigKey, content: &str, format: ConfigFormat) -> Result<bool> {
        let token = self.access_token().await?;

        let build = |base: &str| {
            let request = self
                .client
                .post(format!("{}{}", base, CONFIGS_PATH))
                .form(&[
                    ("tenant", key.namespace_id()),
                    ("dataId", key.data_id()),
                    ("group", key.group()),
                    ("content", content),
                    ("type", format.nacos_type()),
                ]);
            with_token(request, token.as_deref())
        };

        let response = match &self.api_base {
            Some(base) => build(base)
                .send()
                .await
                .map_err(|e| ConfigError::RemoteError(format!("Publish request failed: {}", e)))?,
            None => self.send_with_failover(&build).await?,
        };

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let body = response.text().await.map_err(|e| {
            ConfigError::RemoteError(format!("Failed to read publish response: {}", e))
        })?;
        let published: bool = serde_json::from_str(body.trim()).map_err(|e| {
            ConfigError::ParseError(format!("Unexpected publish response '{}': {}", body, e))
        })?;

        debug!(key = %key, published, "published config");
        Ok(published)
    }

    fn name(&self) -> String {
        let hosts: Vec<String> = self
            .servers
            .iter()
            .map(|s| format!("{}:{}", s.host, s.port))
            .collect();
        format!("nacos:{}", hosts.join(","))
    }
}

fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.query(&[("accessToken", token)]),
        None => request,
    }
}

/// When a token with `ttl_secs` lifetime should be replaced: after 90% of it.
fn refresh_deadline(now: Instant, ttl_secs: u64) -> Instant {
    let ttl = Duration::from_secs(ttl_secs).min(MAX_TOKEN_LIFETIME);
    now.checked_add(ttl - ttl / 10).unwrap_or(now)
}

fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Encode one `Listening-Configs` entry.
fn listening_configs(key: &ConfigKey, content_md5: &str) -> String {
    format!(
        "{}{w}{}{w}{}{w}{}{l}",
        key.data_id(),
        key.group(),
        content_md5,
        key.namespace_id(),
        w = WORD_SEPARATOR,
        l = LINE_SEPARATOR
    )
}

/// Decode the listener response into `(data_id, group, tenant)` entries.
fn changed_keys(body: &str) -> Result<Vec<(String, String, String)>> {
    let decoded = urlencoding::decode(body.trim())
        .map_err(|e| ConfigError::ParseError(format!("Invalid listener response: {}", e)))?;

    Ok(decoded
        .split(LINE_SEPARATOR)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split(WORD_SEPARATOR);
            let data_id = parts.next()?.to_string();
            let group = parts.next()?.to_string();
            let tenant = parts.next().unwrap_or_default().to_string();
            Some((data_id, group, tenant))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConfigKey {
        ConfigKey::new("ns-1", "orders", "DEFAULT_GROUP").unwrap()
    }

    #[test]
    fn test_listening_configs_encoding() {
        let encoded = listening_configs(&key(), "abc");
        assert_eq!(encoded, "orders\u{2}DEFAULT_GROUP\u{2}abc\u{2}ns-1\u{1}");
    }

    #[test]
    fn test_changed_keys_decoding() {
        let body = urlencoding::encode("orders\u{2}DEFAULT_GROUP\u{2}ns-1\u{1}").into_owned();
        let keys = changed_keys(&body).unwrap();
        assert_eq!(
            keys,
            vec![(
                "orders".to_string(),
                "DEFAULT_GROUP".to_string(),
                "ns-1".to_string()
            )]
        );
    }

    #[test]
    fn test_changed_keys_empty_body() {
        assert!(changed_keys("").unwrap().is_empty());
        assert!(changed_keys("\n").unwrap().is_empty());
    }

    #[test]
    fn test_changed_keys_without_tenant() {
        let body = urlencoding::encode("orders\u{2}G\u{1}").into_owned();
        let keys = changed_keys(&body).unwrap();
        assert_eq!(keys[0].2, "");
    }

    #[test]
    fn test_refresh_deadline() {
        let now = Instant::now();
        assert_eq!(refresh_deadline(now, 100), now + Duration::from_secs(90));
        assert_eq!(refresh_deadline(now, 0), now);
        // Absurd lifetimes are capped instead of overflowing
        assert_eq!(
            refresh_deadline(now, u64::MAX),
            now + MAX_TOKEN_LIFETIME - MAX_TOKEN_LIFETIME / 10
        );
    }

    #[test]
    fn test_normalize_context_path() {
        assert_eq!(normalize_context_path("/nacos"), "/nacos");
        assert_eq!(normalize_context_path("nacos/"), "/nacos");
        assert_eq!(normalize_context_path("/"), "");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = ClientSettings::new("a.local,b.local:9000");
        settings.api_host = Some("http://admin.local:8848/".to_string());
        let source = NacosSource::from_settings(&settings).unwrap();

        assert_eq!(source.name(), "nacos:a.local:8848,b.local:9000");
        assert_eq!(
            source.base_url(&source.servers[1]),
            "http://b.local:9000/nacos"
        );
        assert_eq!(
            source.api_base.as_deref(),
            Some("http://admin.local:8848/nacos")
        );
    }

    #[test]
    fn test_from_settings_rejects_empty_host() {
        assert!(NacosSource::from_settings(&ClientSettings::new("")).is_err());
    }
}
