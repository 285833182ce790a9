//! OpenStack floating IP inventory.
//!
//! Authenticates against Keystone v3 with a project-scoped password and lists
//! floating IPs from the Neutron API, following pagination links. The token
//! is cached and refreshed once when the network API answers 401.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Certificate, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OpenStackConfig;
use crate::error::InventoryError;
use crate::inventory::{FloatingIp, FloatingIpInventory};

const NETWORK_SERVICE: &str = "network";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// An authenticated token and the network endpoint it was issued for.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    network_url: Url,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct FloatingIpPage {
    floatingips: Vec<FloatingIp>,
    #[serde(default)]
    floatingips_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: String,
}

/// Floating IP inventory backed by the OpenStack networking API.
pub struct OpenStackClient {
    http: reqwest::Client,
    config: OpenStackConfig,
    session: Mutex<Option<Session>>,
}

impl OpenStackClient {
    /// Create a client. No request is made until the first listing.
    pub fn new(config: OpenStackConfig) -> Result<Self, InventoryError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout));
        if let Some(path) = &config.cacert {
            for cert in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.insecure {
            warn!("TLS certificate verification is disabled for OpenStack requests");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            config,
            session: Mutex::new(None),
        })
    }

    /// Obtain a token and resolve the network endpoint.
    async fn authenticate(&self) -> Result<Session, InventoryError> {
        let url = format!("{}/auth/tokens", self.config.auth_url.trim_end_matches('/'));
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.config.username,
                            "domain": { "name": self.config.user_domain_name },
                            "password": self.config.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.config.project_name,
                        "domain": { "name": self.config.project_domain_name },
                    }
                }
            }
        });

        debug!(%url, user = %self.config.username, project = %self.config.project_name, "authenticating");
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InventoryError::Auth(format!(
                "keystone returned {} for {}",
                status, url
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| InventoryError::Auth("response has no subject token".to_string()))?;
        let body: TokenResponse = response.json().await?;

        let network_url = match &self.config.network_endpoint {
            Some(endpoint) => parse_base_url(endpoint)?,
            None => self.network_endpoint(&body.token.catalog)?,
        };

        info!(%network_url, "authenticated against keystone");
        Ok(Session { token, network_url })
    }

    /// Pick the network endpoint for the configured interface and region.
    fn network_endpoint(&self, catalog: &[CatalogEntry]) -> Result<Url, InventoryError> {
        let region = self.config.region.as_deref();
        catalog
            .iter()
            .filter(|entry| entry.service_type == NETWORK_SERVICE)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == self.config.interface
                    && region.map_or(true, |region| {
                        endpoint.region_id.as_deref() == Some(region)
                            || endpoint.region.as_deref() == Some(region)
                    })
            })
            .ok_or_else(|| InventoryError::MissingEndpoint {
                service: NETWORK_SERVICE.to_string(),
                interface: self.config.interface.clone(),
            })
            .and_then(|endpoint| parse_base_url(&endpoint.url))
    }

    async fn session(&self) -> Result<Session, InventoryError> {
        if let Some(session) = self.session.lock().clone() {
            return Ok(session);
        }
        let session = self.authenticate().await?;
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    fn invalidate_session(&self) {
        self.session.lock().take();
    }

    /// List all pages of floating IPs for `tag`.
    async fn list_pages(&self, session: &Session, tag: &str) -> Result<Vec<FloatingIp>, ListError> {
        let mut url = session
            .network_url
            .join("v2.0/floatingips")
            .map_err(|e| InventoryError::InvalidUrl(e.to_string()))?;
        if !tag.is_empty() {
            url.query_pairs_mut().append_pair("tags", tag);
        }

        let mut floating_ips = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            debug!(%url, "listing floating ips");
            let response = self
                .http
                .get(url.clone())
                .header(AUTH_TOKEN_HEADER, &session.token)
                .send()
                .await
                .map_err(InventoryError::from)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(ListError::Unauthorized);
            }
            if !status.is_success() {
                return Err(InventoryError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
                .into());
            }

            let page: FloatingIpPage = response.json().await.map_err(InventoryError::from)?;
            floating_ips.extend(page.floatingips);
            next = page
                .floatingips_links
                .into_iter()
                .find(|link| link.rel == "next")
                .map(|link| Url::parse(&link.href))
                .transpose()
                .map_err(|e| InventoryError::InvalidUrl(e.to_string()))?;
        }
        Ok(floating_ips)
    }
}

/// Listing failure, separating an expired token from other errors.
enum ListError {
    Unauthorized,
    Inventory(InventoryError),
}

impl From<InventoryError> for ListError {
    fn from(e: InventoryError) -> Self {
        ListError::Inventory(e)
    }
}

#[async_trait]
impl FloatingIpInventory for OpenStackClient {
    async fn list_tagged(&self, tag: &str) -> Result<Vec<FloatingIp>, InventoryError> {
        let session = self.session().await?;
        match self.list_pages(&session, tag).await {
            Ok(floating_ips) => Ok(floating_ips),
            Err(ListError::Inventory(e)) => Err(e),
            Err(ListError::Unauthorized) => {
                warn!("token rejected by network API, re-authenticating");
                self.invalidate_session();
                let session = self.session().await?;
                match self.list_pages(&session, tag).await {
                    Ok(floating_ips) => Ok(floating_ips),
                    Err(ListError::Inventory(e)) => Err(e),
                    Err(ListError::Unauthorized) => {
                        self.invalidate_session();
                        Err(InventoryError::Auth(
                            "token rejected by network API after re-authentication".to_string(),
                        ))
                    }
                }
            }
        }
    }
}

/// Read every certificate from a PEM bundle. An empty bundle is an error.
fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, InventoryError> {
    let ca_bundle_error = |reason: String| InventoryError::CaBundle {
        path: path.display().to_string(),
        reason,
    };
    let pem = std::fs::read(path).map_err(|e| ca_bundle_error(e.to_string()))?;
    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| ca_bundle_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(ca_bundle_error("no certificates found".to_string()));
    }
    debug!(path = %path.display(), count = certs.len(), "loaded CA bundle");
    Ok(certs)
}

/// Parse an endpoint as a base URL that relative paths can be joined onto.
fn parse_base_url(endpoint: &str) -> Result<Url, InventoryError> {
    let mut endpoint = endpoint.to_string();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Url::parse(&endpoint).map_err(|e| InventoryError::InvalidUrl(format!("{}: {}", endpoint, e)))
}
