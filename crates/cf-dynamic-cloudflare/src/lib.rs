// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider`.
//
// - Bearer token authentication, 30 second HTTP timeout
// - Zones and their A/AAAA records are listed once and cached per provider
// - Updates overwrite an existing record in place; records are never created
// - Dry-run mode performs all reads and logs the PUT it would send
// - No retry logic: retries are owned by `UpdateEngine`
//
// ## Security
//
// - The API token never appears in logs or `Debug` output
// - An empty token is rejected at construction
//
// ## API Reference
//
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?page=N&per_page=100`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cf_dynamic_core::traits::{DnsProvider, RecordMetadata, RecordType, UpdateResult};
use cf_dynamic_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::Mutex;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

const PROVIDER_NAME: &str = "cloudflare";

/// Response envelope shared by every v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// A zone visible to the token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: Option<u32>,
    proxied: Option<bool>,
}

#[derive(Debug, Serialize)]
struct UpdateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxied: Option<bool>,
}

/// Zones and address records listed from the API
#[derive(Debug, Default)]
struct RecordCache {
    zones: Vec<Zone>,
    records: HashMap<(RecordType, String), RecordMetadata>,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone and record listing)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,

    /// Filled on first use
    cache: Mutex<Option<RecordCache>>,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("cf-dynamic/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
            cache: Mutex::new(None),
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether updates are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// List every zone the token can see
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/zones", self.base_url);
        let zones: Vec<Zone> = self.get_all_pages(&url, ZONES_PER_PAGE, "zone listing").await?;
        tracing::debug!("Found {} zones", zones.len());
        Ok(zones)
    }

    /// Drop cached zones and records; the next lookup lists them again
    pub async fn invalidate_cache(&self) {
        *self.cache.lock().await = None;
    }

    async fn list_address_records(&self, zone: &Zone) -> Result<Vec<RecordMetadata>> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone.id);
        let records: Vec<DnsRecord> = self
            .get_all_pages(&url, RECORDS_PER_PAGE, "record listing")
            .await?;

        let records: Vec<RecordMetadata> = records
            .into_iter()
            .filter_map(|r| {
                let record_type = RecordType::from_wire(&r.record_type)?;
                Some(RecordMetadata {
                    id: r.id,
                    zone_id: zone.id.clone(),
                    name: r.name,
                    record_type,
                    content: r.content,
                    ttl: r.ttl,
                    proxied: r.proxied,
                })
            })
            .collect();

        tracing::debug!("Zone {}: {} address records", zone.name, records.len());
        Ok(records)
    }

    async fn load_cache(&self) -> Result<RecordCache> {
        let zones = self.list_zones().await?;
        let mut records = HashMap::new();

        for zone in &zones {
            for record in self.list_address_records(zone).await? {
                records.insert((record.record_type, record.name.clone()), record);
            }
        }

        Ok(RecordCache { zones, records })
    }

    /// Look up a cached record, listing zones and records on first use
    async fn cached_record(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<RecordMetadata>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load_cache().await?);
        }

        Ok(cache
            .as_ref()
            .and_then(|c| c.records.get(&(record_type, record_name.to_string())))
            .cloned())
    }

    async fn store_cached(&self, record: RecordMetadata) {
        if let Some(cache) = self.cache.lock().await.as_mut() {
            cache
                .records
                .insert((record.record_type, record.name.clone()), record);
        }
    }

    /// Fetch every page of a list endpoint
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        per_page: u32,
        what: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(url)
                .query(&[("page", page), ("per_page", per_page)]);
            let envelope: Envelope<Vec<T>> = self.send(request, what).await?;

            let total_pages = envelope
                .result_info
                .as_ref()
                .map(|info| info.total_pages)
                .unwrap_or(0);
            let current = envelope
                .result_info
                .as_ref()
                .map(|info| info.page)
                .filter(|p| *p > 0)
                .unwrap_or(page);

            items.extend(envelope.result.unwrap_or_default());

            if current >= total_pages {
                break;
            }
            page = current + 1;
        }

        Ok(items)
    }

    /// Send an authenticated request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, what));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse {} response: {}", what, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} failed: {}", what, describe_errors(&envelope.errors)),
            ));
        }

        Ok(envelope)
    }
}

/// Map an unsuccessful HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, what: &str) -> Error {
    let message = error_message(error_text);
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", what, message)),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("Cloudflare server error (transient): {} - {}", status, message),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{} failed: {} - {}", what, status, message),
        ),
    }
}

/// Prefer the envelope's messages over the raw body
fn error_message(error_text: &str) -> String {
    match serde_json::from_str::<Envelope<serde_json::Value>>(error_text) {
        Ok(envelope) if !envelope.errors.is_empty() => describe_errors(&envelope.errors),
        _ => error_text.to_string(),
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn verify(&self) -> Result<()> {
        let zones = self.list_zones().await?;
        tracing::info!("Cloudflare token accepted ({} zones visible)", zones.len());
        Ok(())
    }

    async fn get_record(&self, record_name: &str, record_type: RecordType) -> Result<RecordMetadata> {
        self.cached_record(record_name, record_type)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "DNS record not found: {} (type: {})",
                    record_name, record_type
                ))
            })
    }

    /// Overwrite an existing record
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {
    ///   "type": "A" or "AAAA",
    ///   "name": "home.example.com",
    ///   "content": "198.51.100.7",
    ///   "ttl": 1,
    ///   "proxied": false
    /// }
    /// ```
    async fn update_record(
        &self,
        record_name: &str,
        record_type: RecordType,
        new_ip: IpAddr,
    ) -> Result<UpdateResult> {
        if record_type.version() != cf_dynamic_core::IpVersion::of(&new_ip) {
            return Err(Error::invalid_input(format!(
                "Cannot store {} in a {} record",
                new_ip, record_type
            )));
        }

        let record = self.get_record(record_name, record_type).await?;

        let url = format!(
            "{}/zones/{}/dns_records/{}",
            self.base_url, record.zone_id, record.id
        );
        let payload = UpdateRecordRequest {
            record_type: record_type.as_str(),
            name: &record.name,
            content: new_ip.to_string(),
            ttl: record.ttl,
            proxied: record.proxied,
        };

        tracing::info!(
            "Updating Cloudflare DNS record: {} -> {} ({}) [mode: {}]",
            record_name,
            new_ip,
            record_type,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(UpdateResult::DryRun {
                previous: record.content,
                new_ip,
            });
        }

        let envelope: Envelope<DnsRecord> = self
            .send(self.client.put(&url).json(&payload), "record update")
            .await?;

        let updated = envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "Invalid response format: missing result")
        })?;

        // Compare as addresses: the API may normalize IPv6 notation
        if updated.content.parse::<IpAddr>().ok() != Some(new_ip) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "{} {} record not updated (content is {})",
                    record_name, record_type, updated.content
                ),
            ));
        }

        tracing::info!("DNS record updated successfully: {} -> {}", record_name, new_ip);

        let previous = record.content.clone();
        self.store_cached(RecordMetadata {
            content: updated.content,
            ttl: updated.ttl.or(record.ttl),
            proxied: updated.proxied.or(record.proxied),
            ..record
        })
        .await;

        Ok(UpdateResult::Updated { previous, new_ip })
    }

    async fn begin_pass(&self) {
        self.invalidate_cache().await;
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
