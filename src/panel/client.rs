use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{translate, PanelFlavor};
use crate::config::PanelConfig;
use crate::error::{Result, YasspError};
use crate::models::{ServerDescriptor, TrafficReport};

/// How requests prove who we are
#[derive(Clone)]
pub enum PanelAuth {
    /// Shared secret sent as the `token` query parameter
    Token(String),
    /// HTTP basic auth with the node hostname as user name
    Basic { username: String, password: String },
}

impl std::fmt::Debug for PanelAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelAuth::Token(_) => f.write_str("Token(***)"),
            PanelAuth::Basic { username, .. } => write!(f, "Basic({}:***)", username),
        }
    }
}

/// HTTP client for one panel.
///
/// There are no retries here. A failed call fails the current tick and the
/// next scheduled tick starts over.
#[derive(Debug, Clone)]
pub struct PanelClient {
    base_url: Url,
    flavor: PanelFlavor,
    auth: PanelAuth,
    timeout: Duration,
    http: reqwest::Client,
}

impl PanelClient {
    pub fn new(
        base_url: Url,
        flavor: PanelFlavor,
        hostname: &str,
        psk: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let auth = match flavor {
            PanelFlavor::Nico => PanelAuth::Token(psk.to_string()),
            PanelFlavor::Moyu => PanelAuth::Basic {
                username: hostname.to_string(),
                password: psk.to_string(),
            },
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("yassp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            flavor,
            auth,
            timeout,
            http,
        })
    }

    pub fn from_config(config: &PanelConfig) -> Result<Self> {
        Self::new(
            config.url.clone(),
            config.flavor,
            &config.hostname,
            &config.psk,
            config.request_timeout,
        )
    }

    pub fn flavor(&self) -> PanelFlavor {
        self.flavor
    }

    /// Send one authenticated request.
    ///
    /// 200 yields the decoded JSON body, 204 yields `None`, 403 is an
    /// authentication failure and every other status is unexpected.
    #[instrument(skip(self, query, body), fields(flavor = %self.flavor))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>> {
        let url = self.base_url.join(path)?;

        let mut params: Vec<(&str, &str)> = query.to_vec();
        let mut builder = self
            .http
            .request(method, url)
            .timeout(timeout.unwrap_or(self.timeout));

        match &self.auth {
            PanelAuth::Token(token) => params.push(("token", token.as_str())),
            PanelAuth::Basic { username, password } => {
                builder = builder.basic_auth(username, Some(password));
            }
        }
        if !params.is_empty() {
            builder = builder.query(&params);
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("Panel replied {}", status);

        match status {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::FORBIDDEN => Err(YasspError::Authentication),
            other => Err(YasspError::UnexpectedResponse(format!("HTTP {}", other))),
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        self.request(Method::GET, path, query, None, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<Option<Value>> {
        self.request(Method::POST, path, query, Some(body), None).await
    }

    /// Pull the full profile list and translate it.
    ///
    /// Any malformed record fails the whole list.
    pub async fn fetch_profiles(&self, bind_host: &str) -> Result<Vec<ServerDescriptor>> {
        let (path, query) = self.flavor.profiles_endpoint();

        let records = match self.get(path, query).await? {
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(YasspError::Payload(
                    "profile list is not a JSON array".into(),
                ))
            }
            None => {
                return Err(YasspError::UnexpectedResponse(
                    "empty profile list response".into(),
                ))
            }
        };

        translate(self.flavor, bind_host, records).collect()
    }

    /// Upload one due set as a single request.
    pub async fn upload_traffic(&self, report: &TrafficReport) -> Result<()> {
        let (path, query) = self.flavor.traffic_endpoint();
        let body = self.flavor.encode_traffic(report);

        let reply = self.post(path, query, &body).await?;
        self.flavor.check_upload_reply(reply.as_ref())
    }
}
