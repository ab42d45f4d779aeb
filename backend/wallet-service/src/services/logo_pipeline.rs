//! Background normalization of token logos
//!
//! Upstream logos arrive as inline `data:` URIs or arbitrary remote URLs.
//! Each sweep picks up tokens still in `LogoStatus::New`, re-hosts the image
//! under our public URL and moves the token to `Handled`, or marks it
//! `Failed`. Both outcomes are terminal.

use crate::db::TokenStore;
use crate::error::{Result, ServiceError};
use crate::models::{LogoStatus, TokenKey, TokenRecord};
use crate::services::token_resolver::TokenResolver;
use crate::services::uploader::BlobUploader;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageFormat;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct LogoPipelineConfig {
    pub sweep_interval: Duration,
    /// Timeout for downloading a remote logo
    pub fetch_timeout: Duration,
    /// URIs under this prefix are already hosted by us
    pub hosted_prefix: String,
}

impl Default for LogoPipelineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(15),
            hosted_prefix: String::new(),
        }
    }
}

/// Where a logo URI points
#[derive(Debug, PartialEq, Eq)]
pub enum LogoSource<'a> {
    /// `data:<content-type>;base64,<payload>`
    Inline { content_type: &'a str, payload: &'a str },
    Hosted,
    Remote(&'a str),
    Unsupported,
}

pub fn classify<'a>(uri: &'a str, hosted_prefix: &str) -> LogoSource<'a> {
    if uri.starts_with("data:image/") {
        return parse_data_uri(uri).unwrap_or(LogoSource::Unsupported);
    }
    if is_hosted(uri, hosted_prefix) {
        return LogoSource::Hosted;
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return LogoSource::Remote(uri);
    }
    LogoSource::Unsupported
}

/// `uri` lives under `hosted_prefix` as a path, not merely a string prefix
fn is_hosted(uri: &str, hosted_prefix: &str) -> bool {
    let prefix = hosted_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    uri.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn parse_data_uri(uri: &str) -> Option<LogoSource<'_>> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let (content_type, encoding) = header.split_once(';')?;
    if encoding != "base64" {
        return None;
    }
    Some(LogoSource::Inline { content_type, payload })
}

/// Content type of an image payload, from its magic bytes
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    let mime = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(mime)
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    String::from_utf8_lossy(head).contains("<svg")
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "image/tiff" => ".tiff",
        "image/avif" => ".avif",
        "image/svg+xml" => ".svg",
        _ => "",
    }
}

/// `coin_<symbol>_<chain>_<5 random chars><ext>`, lowercased
pub fn logo_file_name(token: &TokenRecord, content_type: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();

    format!(
        "coin_{}_{}_{}{}",
        token.symbol,
        token.chain,
        suffix,
        extension_for(content_type)
    )
    .to_lowercase()
}

/// Result of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub handled: usize,
    pub failed: usize,
}

pub struct LogoPipeline {
    store: Arc<dyn TokenStore>,
    uploader: Arc<dyn BlobUploader>,
    resolver: Arc<TokenResolver>,
    http: Client,
    config: LogoPipelineConfig,
}

impl LogoPipeline {
    pub fn new(
        store: Arc<dyn TokenStore>,
        uploader: Arc<dyn BlobUploader>,
        resolver: Arc<TokenResolver>,
        config: LogoPipelineConfig,
    ) -> Result<Self> {
        let http = Client::builder().timeout(config.fetch_timeout).build()?;
        Ok(Self {
            store,
            uploader,
            resolver,
            http,
            config,
        })
    }

    pub fn config(&self) -> &LogoPipelineConfig {
        &self.config
    }

    /// Process every token whose logo is still `New`
    pub async fn run_once(&self) -> Result<SweepReport> {
        let tokens = self.store.tokens_with_logo_status(LogoStatus::New).await?;
        let mut report = SweepReport::default();

        for token in tokens {
            let key = token.key();
            match self.normalize(&token).await {
                Ok(Some(url)) if url.len() >= 5 => {
                    if let Err(e) = self.store.update_logo(&key, &url, LogoStatus::Handled).await {
                        // An uploaded logo never stays New
                        error!(
                            address = %key.address,
                            chain = %key.chain,
                            uploaded = %url,
                            error = %e,
                            "Failed to store normalized logo"
                        );
                        self.set_status(&key, LogoStatus::Failed).await;
                        report.failed += 1;
                        continue;
                    }
                    self.resolver.refresh_logo(&key, &url).await;
                    report.handled += 1;
                }
                Ok(None) => {
                    self.set_status(&key, LogoStatus::Handled).await;
                    report.handled += 1;
                }
                Ok(Some(_)) => {
                    self.set_status(&key, LogoStatus::Failed).await;
                    report.failed += 1;
                }
                Err(e) => {
                    debug!(
                        address = %key.address,
                        chain = %key.chain,
                        error = %e,
                        "Logo normalization failed"
                    );
                    self.set_status(&key, LogoStatus::Failed).await;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Returns the new URL, or `None` when the logo is already hosted
    async fn normalize(&self, token: &TokenRecord) -> Result<Option<String>> {
        match classify(&token.logo_uri, &self.config.hosted_prefix) {
            LogoSource::Hosted => Ok(None),
            LogoSource::Inline { content_type, payload } => {
                let bytes = BASE64
                    .decode(payload.trim())
                    .map_err(|e| ServiceError::Validation(format!("invalid base64 logo: {}", e)))?;
                let content_type = match sniff_image(&bytes) {
                    Some(sniffed) => sniffed,
                    None if content_type == "image/svg+xml" && is_svg(&bytes) => "image/svg+xml",
                    None => {
                        return Err(ServiceError::Validation(
                            "inline logo is not an image".into(),
                        ))
                    }
                };
                self.upload(token, bytes, content_type).await.map(Some)
            }
            LogoSource::Remote(url) => {
                let (bytes, content_type) = self.download(url).await?;
                self.upload(token, bytes, &content_type).await.map(Some)
            }
            LogoSource::Unsupported => Err(ServiceError::Validation(format!(
                "unsupported logo uri scheme for {}",
                token.address
            ))),
        }
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::TransientFetch(format!(
                "logo fetch returned {}",
                response.status()
            )));
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        let bytes = response.bytes().await?.to_vec();

        let content_type = match (sniff_image(&bytes), header_type) {
            (Some(sniffed), _) => sniffed.to_string(),
            (None, Some(header)) if header.starts_with("image/") => header,
            _ => return Err(ServiceError::Validation("remote logo is not an image".into())),
        };

        Ok((bytes, content_type))
    }

    async fn upload(
        &self,
        token: &TokenRecord,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let file_name = logo_file_name(token, content_type);
        self.uploader.upload(bytes, &file_name, content_type).await
    }

    async fn set_status(&self, key: &TokenKey, status: LogoStatus) {
        if let Err(e) = self.store.update_logo_status(key, status).await {
            warn!(
                address = %key.address,
                status = ?status,
                error = %e,
                "Failed to update logo status"
            );
        }
    }
}

/// Run `run_once` every sweep interval until shutdown is signalled
pub fn spawn_logo_worker(
    pipeline: Arc<LogoPipeline>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = pipeline.config().sweep_interval;
    info!(interval_secs = interval.as_secs(), "Starting logo normalization worker");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match pipeline.run_once().await {
                        Ok(report) if report.handled + report.failed > 0 => {
                            info!(
                                handled = report.handled,
                                failed = report.failed,
                                "Logo sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Logo sweep failed"),
                    }
                }
            }
        }

        info!("Logo normalization worker stopped");
    })
}
