//! Blocking slskd REST client. Every call is made from a background thread.

use crate::config::AppConfig;
use crate::flatten::RawResponder;
use crate::service::{RemoteDirectory, SearchService, SessionState, TransferRequest};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const API_PREFIX: &str = "api/v0";
const DEFAULT_TIMEOUT_SECS: f64 = 15.0;
const MAX_TIMEOUT_SECS: f64 = 3600.0;

#[derive(Debug, Clone)]
enum Auth {
    ApiKey(String),
    Token(String),
    Login { username: String, password: String },
}

pub struct SlskdClient {
    agent: ureq::Agent,
    base_url: String,
    auth: Auth,
    session_token: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct StartedSearch {
    id: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Percent-encodes one URL path segment. Soulseek usernames routinely
/// contain spaces and punctuation.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn base_url(host: &str, url_base: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let base = url_base.trim().trim_matches('/');
    if base.is_empty() {
        host.to_string()
    } else {
        format!("{host}/{base}")
    }
}

fn request_timeout(secs: f64) -> Duration {
    let secs = if secs.is_nan() {
        DEFAULT_TIMEOUT_SECS
    } else {
        secs.clamp(1.0, MAX_TIMEOUT_SECS)
    };
    Duration::from_secs_f64(secs)
}

impl SlskdClient {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let auth = if !cfg.api_key.is_empty() {
            Auth::ApiKey(cfg.api_key.clone())
        } else if !cfg.token.is_empty() {
            Auth::Token(cfg.token.clone())
        } else if !cfg.username.is_empty() && !cfg.password.is_empty() {
            Auth::Login {
                username: cfg.username.clone(),
                password: cfg.password.clone(),
            }
        } else {
            bail!("No credentials provided. Configure API key, token, or username/password.");
        };

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(!cfg.verify_ssl)
            .build()
            .context("failed to build TLS connector")?;
        let agent = ureq::AgentBuilder::new()
            .timeout(request_timeout(cfg.timeout_s))
            .tls_connector(Arc::new(tls))
            .build();

        Ok(Self {
            agent,
            base_url: base_url(&cfg.host, &cfg.url_base),
            auth,
            session_token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{API_PREFIX}/{path}", self.base_url)
    }

    fn login(&self, username: &str, password: &str) -> Result<String> {
        if let Ok(guard) = self.session_token.lock() {
            if let Some(token) = guard.as_ref() {
                return Ok(token.clone());
            }
        }
        let response: LoginResponse = self
            .agent
            .post(&self.url("session"))
            .send_json(json!({ "username": username, "password": password }))
            .context("login failed")?
            .into_json()
            .context("invalid login response")?;
        if let Ok(mut guard) = self.session_token.lock() {
            *guard = Some(response.token.clone());
        }
        Ok(response.token)
    }

    fn request(&self, method: &str, path: &str) -> Result<ureq::Request> {
        let req = self.agent.request(method, &self.url(path));
        Ok(match &self.auth {
            Auth::ApiKey(key) => req.set("X-API-Key", key),
            Auth::Token(token) => req.set("Authorization", &format!("Bearer {token}")),
            Auth::Login { username, password } => {
                let token = self.login(username, password)?;
                req.set("Authorization", &format!("Bearer {token}"))
            }
        })
    }

    /// Passes `result` through, dropping a cached login token the server
    /// no longer accepts so the next request logs in again.
    fn checked(
        &self,
        result: std::result::Result<ureq::Response, ureq::Error>,
    ) -> std::result::Result<ureq::Response, ureq::Error> {
        if let Err(ureq::Error::Status(401, _)) = &result {
            if let Ok(mut guard) = self.session_token.lock() {
                if guard.take().is_some() {
                    debug!("session token rejected, will log in again");
                }
            }
        }
        result
    }

    /// Sends a request whose only interesting outcome is success or not.
    /// HTTP error statuses become `false`; transport failures stay errors.
    fn acknowledged(&self, result: std::result::Result<ureq::Response, ureq::Error>) -> Result<bool> {
        match self.checked(result) {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(code, _)) => {
                debug!(code, "request rejected");
                Ok(false)
            }
            Err(err) => Err(anyhow!(err)),
        }
    }
}

impl SearchService for SlskdClient {
    fn start_search(&self, query: &str, timeout_ms: u64) -> Result<String> {
        let started: StartedSearch = self
            .checked(
                self.request("POST", "searches")?
                    .send_json(json!({ "searchText": query, "searchTimeout": timeout_ms })),
            )
            .with_context(|| format!("cannot reach {}", self.base_url))?
            .into_json()
            .context("invalid search response")?;
        Ok(started.id)
    }

    fn session_state(&self, session_id: &str, include_responses: bool) -> Result<SessionState> {
        let request = self
            .request("GET", &format!("searches/{}", encode_segment(session_id)))?
            .query("includeResponses", if include_responses { "true" } else { "false" });
        self.checked(request.call())
            .context("search state request failed")?
            .into_json()
            .context("invalid search state")
    }

    fn session_responses(&self, session_id: &str) -> Result<Vec<RawResponder>> {
        let request = self.request(
            "GET",
            &format!("searches/{}/responses", encode_segment(session_id)),
        )?;
        self.checked(request.call())
            .context("search responses request failed")?
            .into_json()
            .context("invalid search responses")
    }

    fn stop_session(&self, session_id: &str) -> Result<bool> {
        let path = format!("searches/{}", encode_segment(session_id));
        self.acknowledged(self.request("PUT", &path)?.call())
    }

    fn delete_session(&self, session_id: &str) -> Result<bool> {
        let path = format!("searches/{}", encode_segment(session_id));
        self.acknowledged(self.request("DELETE", &path)?.call())
    }

    fn enqueue_transfers(&self, owner: &str, files: &[TransferRequest]) -> Result<bool> {
        let path = format!("transfers/downloads/{}", encode_segment(owner));
        self.acknowledged(self.request("POST", &path)?.send_json(files))
    }

    fn directory_listing(&self, owner: &str, path: &str) -> Result<Vec<RemoteDirectory>> {
        let endpoint = format!("users/{}/directory", encode_segment(owner));
        let request = self.request("POST", &endpoint)?;
        let value: serde_json::Value = self
            .checked(request.send_json(json!({ "directory": path })))
            .context("directory request failed")?
            .into_json()
            .context("invalid directory listing")?;
        // Some server versions answer with a single directory object.
        let listing = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            serde_json::Value::Null => Vec::new(),
            other => vec![serde_json::from_value(other)?],
        };
        Ok(listing)
    }
}
