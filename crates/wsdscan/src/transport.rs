// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Unicast SOAP-over-HTTP transport.
//!
//! All directed exchanges (probe, resolve, transfer, eventing, scan
//! operations) go through the [`Transport`] trait so tests can script device
//! replies without a network. The production implementation is
//! [`HttpTransport`] on top of reqwest, with a short jittered retry for the
//! flaky first-packet behavior some devices show right after waking.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Retries after the first attempt fails with a retryable condition.
const RETRIES: u32 = 2;
/// Upper bound on one backoff sleep.
const BACKOFF_CAP: Duration = Duration::from_millis(500);

/// A raw SOAP reply. `content_type` is kept verbatim because image retrieval
/// replies are MIME multipart and the boundary lives in that header.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl SoapResponse {
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Unicast request transport. One call is one HTTP POST round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, address: &str, body: &str, timeout: Duration) -> Result<SoapResponse>;
}

/// reqwest-backed transport with rustls.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }

    async fn post_once(
        &self,
        address: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<SoapResponse> {
        let resp = self
            .client
            .post(address)
            .header("Content-Type", "application/soap+xml")
            .header("User-Agent", "wsdscan")
            .timeout(timeout)
            .body(body.to_string())
            .send()
            .await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp.bytes().await?;
        Ok(SoapResponse {
            content_type,
            body: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, address: &str, body: &str, timeout: Duration) -> Result<SoapResponse> {
        let mut backoff = Duration::from_millis(rand::rng().random_range(50..=250));
        let mut last_err = None;
        for attempt in 0..=RETRIES {
            match self.post_once(address, body, timeout).await {
                Ok(resp) => return Ok(resp),
                Err(e @ (Error::Timeout(_) | Error::Http(_))) => {
                    debug!(address, attempt, error = %e, "soap post failed");
                    last_err = Some(e);
                    if attempt < RETRIES {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_CAP);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Timeout(address.to_string())))
    }
}

/// Post `body` to the first candidate address that answers.
///
/// Per-address failures are logged and skipped so one stale xaddr does not
/// sink the whole exchange; the last error is returned only when every
/// address failed.
pub async fn submit_request(
    transport: &dyn Transport,
    addresses: &[String],
    body: &str,
    timeout: Duration,
) -> Result<SoapResponse> {
    let mut last_err = Error::Timeout("no candidate addresses".into());
    for address in addresses {
        match transport.post(address, body, timeout).await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                warn!(address, error = %e, "candidate address failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}
