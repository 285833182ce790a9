//! Configuration types for ospfip-dns.

use hickory_proto::rr::{LowerName, Name};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DnsError;
use crate::tags::is_zone_origin;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// OpenStack credentials and endpoints.
    pub openstack: OpenStackConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<(), DnsError> {
        self.dns.validate()?;
        self.openstack.validate()
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,

    /// Zone suffixes this instance is authoritative for.
    /// Floating IP names outside all of them are ignored.
    #[serde(default = "default_origins")]
    pub origins: Vec<String>,

    /// TTL for DNS records in seconds, also the SOA minimum.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Interval between inventory refreshes.
    #[serde(
        default = "default_refresh",
        deserialize_with = "deserialize_refresh",
        serialize_with = "serialize_refresh"
    )]
    pub refresh: Duration,
}

impl DnsConfig {
    /// Validate refresh interval and origins.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.refresh.is_zero() {
            return Err(DnsError::Config(
                "refresh interval must be greater than 0".to_string(),
            ));
        }
        if self.origins.is_empty() {
            return Err(DnsError::Config("at least one origin is required".to_string()));
        }
        if let Some(origin) = self.origins.iter().find(|o| !is_zone_origin(o.trim())) {
            return Err(DnsError::Config(format!(
                "origin {:?} is not a valid domain name",
                origin
            )));
        }
        self.origin_names().map(|_| ())
    }

    /// Origins as normalized (lowercase, fully qualified) names.
    pub fn origin_names(&self) -> Result<Vec<LowerName>, DnsError> {
        self.origins
            .iter()
            .map(|origin| {
                let mut name = Name::from_ascii(origin.trim()).map_err(|e| {
                    DnsError::Config(format!("invalid origin {:?}: {}", origin, e))
                })?;
                name.set_fqdn(true);
                Ok(LowerName::from(name))
            })
            .collect()
    }
}

/// OpenStack Keystone credentials and network endpoint selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenStackConfig {
    /// Keystone v3 endpoint (e.g., "https://keystone.example.net:5000/v3").
    pub auth_url: String,

    /// User name for password authentication.
    pub username: String,

    /// Password for password authentication.
    #[serde(skip_serializing)]
    pub password: String,

    /// Domain of the user.
    #[serde(default = "default_domain")]
    pub user_domain_name: String,

    /// Project to scope the token to.
    pub project_name: String,

    /// Domain of the project.
    #[serde(default = "default_domain")]
    pub project_domain_name: String,

    /// Region used to pick the network endpoint from the catalog.
    #[serde(default)]
    pub region: Option<String>,

    /// Endpoint interface: public, internal or admin.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Network API endpoint, bypassing the service catalog.
    #[serde(default)]
    pub network_endpoint: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// PEM bundle of additional CAs trusted for Keystone and Neutron.
    #[serde(default)]
    pub cacert: Option<PathBuf>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
}

impl OpenStackConfig {
    fn validate(&self) -> Result<(), DnsError> {
        if self.auth_url.trim().is_empty() {
            return Err(DnsError::Config("openstack.auth_url is required".to_string()));
        }
        Ok(())
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "ospfip_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "ospfip-dns".to_string()
}

fn default_origins() -> Vec<String> {
    vec![".".to_string()]
}

fn default_ttl() -> u32 {
    3600
}

fn default_refresh() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_domain() -> String {
    "Default".to_string()
}

fn default_interface() -> String {
    "public".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRefresh {
    Seconds(u64),
    Text(String),
}

fn deserialize_refresh<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawRefresh::deserialize(deserializer)?;
    let refresh = match raw {
        RawRefresh::Seconds(secs) => Duration::from_secs(secs),
        RawRefresh::Text(text) => parse_refresh(&text).map_err(serde::de::Error::custom)?,
    };
    if refresh.is_zero() {
        return Err(serde::de::Error::custom(
            "refresh interval must be greater than 0",
        ));
    }
    Ok(refresh)
}

fn serialize_refresh<S>(refresh: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}ms", refresh.as_millis()))
}

/// Parse a refresh interval.
///
/// A bare integer is a number of seconds. Anything else is a sequence of
/// `<number><unit>` groups with units `ms`, `s`, `m` and `h`, e.g. `1m30s`.
pub fn parse_refresh(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("unable to parse duration {:?}", input));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("unable to parse duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, input)),
        };
        total = unit
            .and_then(|unit| total.checked_add(unit))
            .ok_or_else(|| format!("duration {:?} out of range", input))?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}
