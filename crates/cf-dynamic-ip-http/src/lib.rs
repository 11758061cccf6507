// # HTTP IP Source
//
// Discovers the public address by asking an echo service that returns the
// caller's address as plain text (icanhazip by default).
//
// ## Architecture
//
// One source per address family. `current()` performs a single request;
// `watch()` polls at the configured interval and emits an event whenever
// the address differs from the last one seen.

use cf_dynamic_core::config::IpSourceConfig;
use cf_dynamic_core::traits::{IpChangeEvent, IpSource, IpVersion};
use cf_dynamic_core::{Error, Result};

use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// HTTP timeout for a single lookup
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A single echo-service endpoint
#[derive(Debug, Clone)]
struct Fetcher {
    url: String,
    version: IpVersion,
    client: reqwest::Client,
}

impl Fetcher {
    async fn fetch(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;
        let ip_text = ip_text.trim();

        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| Error::ip_source(format!("Invalid IP address: {}", ip_text)))?;

        if !self.version.matches(&ip) {
            return Err(Error::ip_source(format!(
                "Expected {}, got: {}",
                self.version, ip
            )));
        }

        Ok(ip)
    }
}

/// HTTP-based public address source
pub struct HttpIpSource {
    fetcher: Fetcher,

    /// Polling interval for `watch`
    poll_interval: Duration,

    /// Last address returned by `current`, seeds the watch loop
    last_ip: Arc<Mutex<Option<IpAddr>>>,
}

impl HttpIpSource {
    /// Create a source from its configuration
    pub fn new(config: IpSourceConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            fetcher: Fetcher {
                url: config.url,
                version: config.version,
                client,
            },
            poll_interval: Duration::from_secs(config.interval_secs),
            last_ip: Arc::new(Mutex::new(None)),
        })
    }

    /// Default IPv4 source (`https://ipv4.icanhazip.com`)
    pub fn ipv4() -> Result<Self> {
        Self::new(IpSourceConfig::ipv4())
    }

    /// Default IPv6 source (`https://ipv6.icanhazip.com`)
    pub fn ipv6() -> Result<Self> {
        Self::new(IpSourceConfig::ipv6())
    }

    /// The URL queried by this source
    pub fn url(&self) -> &str {
        &self.fetcher.url
    }

    /// Poll faster than configuration allows
    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let ip = self.fetcher.fetch().await?;
        *self.last_ip.lock().await = Some(ip);
        Ok(ip)
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = IpChangeEvent> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let fetcher = self.fetcher.clone();
        let poll_interval = self.poll_interval;
        let last_ip = self.last_ip.clone();

        tokio::spawn(async move {
            tracing::info!(
                "Starting HTTP IP monitoring (url={}, interval={:?})",
                fetcher.url,
                poll_interval
            );

            let mut last_known_ip = *last_ip.lock().await;

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = tx.closed() => break,
                }

                match fetcher.fetch().await {
                    Ok(ip) if last_known_ip != Some(ip) => {
                        tracing::info!("IP changed: {:?} -> {}", last_known_ip, ip);

                        if tx.send(IpChangeEvent::new(ip, last_known_ip)).is_err() {
                            break;
                        }
                        last_known_ip = Some(ip);
                        *last_ip.lock().await = Some(ip);
                    }
                    Ok(ip) => tracing::trace!("{} unchanged: {}", fetcher.version, ip),
                    Err(e) => tracing::warn!("{} lookup failed: {}", fetcher.version, e),
                }
            }

            tracing::debug!("Watch stream dropped, stopping monitor for {}", fetcher.url);
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn version(&self) -> Option<IpVersion> {
        Some(self.fetcher.version)
    }
}
