//! HTTP relay to the downstream gateway.
//!
//! One attempt = one `POST {gateway}/async-function/{function}/` carrying the
//! admitted body and the request's retry metadata. Only 200 and 202 count as
//! delivered.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::RelayJob;
use crate::error::{MailboxError, RelayError};
use crate::ports::Relay;

pub const HEADER_RETRIES: &str = "X-Retries";
pub const HEADER_MAX_RETRIES: &str = "X-Max-Retries";
pub const HEADER_DELAY_DURATION: &str = "X-Delay-Duration";

/// Relay backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct GatewayRelay {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl GatewayRelay {
    /// Every attempt is cut off after `timeout`.
    ///
    /// `base_url` must be an absolute http(s) URL; trailing slashes are ignored.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MailboxError> {
        let invalid = |reason: String| MailboxError::Config(format!("gateway_url {base_url:?}: {reason}"));

        let base = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("not an http(s) base URL".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mailbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailboxError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// Target URL for a job, query string included.
    ///
    /// The function name is pushed as one path segment, so `/`, `?` and `#`
    /// in it are percent-encoded instead of changing the target.
    pub fn endpoint(&self, job: &RelayJob) -> Result<Url, RelayError> {
        let definition = &job.definition;
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RelayError::Unreachable(format!("cannot route to {}", self.base)))?
            .pop_if_empty()
            .push("async-function")
            .push(definition.function())
            .push("");
        url.set_query(definition.query());
        Ok(url)
    }
}

#[async_trait]
impl Relay for GatewayRelay {
    async fn attempt(&self, job: &RelayJob) -> Result<u16, RelayError> {
        let url = self.endpoint(job)?;
        let definition = &job.definition;
        let span = info_span!(
            "relay_attempt",
            request_id = %job.id,
            function = definition.function(),
            retries = job.retries,
        );

        async move {
            let started = Instant::now();

            let mut request = self.client.post(url.clone()).body(definition.body().clone());
            for (name, value) in definition.headers() {
                if !is_managed_header(name) {
                    request = request.header(name.as_str(), value.as_str());
                }
            }
            request = request
                .header(HEADER_RETRIES, job.retries.to_string())
                .header(HEADER_MAX_RETRIES, definition.max_retries().to_string())
                .header(
                    HEADER_DELAY_DURATION,
                    definition.restart_delay().as_secs().to_string(),
                );

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(duration_ms = started.elapsed().as_millis(), %url, "cannot reach gateway: {e}");
                    if e.is_timeout() {
                        return Err(RelayError::Timeout(self.timeout));
                    }
                    return Err(RelayError::Unreachable(e.to_string()));
                }
            };

            let status = response.status();
            debug!(
                status = status.as_u16(),
                duration_ms = started.elapsed().as_millis(),
                "gateway responded"
            );

            match status {
                StatusCode::OK | StatusCode::ACCEPTED => {
                    info!(%url, status = status.as_u16(), "relayed");
                    Ok(status.as_u16())
                }
                other => {
                    warn!(%url, status = other.as_u16(), "gateway refused relay");
                    Err(RelayError::Rejected(other.as_u16()))
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Headers never copied from the admitted request: retry metadata is
/// rewritten per attempt, the rest is hop-by-hop or set by the client.
fn is_managed_header(name: &str) -> bool {
    const MANAGED: &[&str] = &[
        HEADER_RETRIES,
        HEADER_MAX_RETRIES,
        HEADER_DELAY_DURATION,
        "host",
        "content-length",
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-connection",
        "proxy-authorization",
        "expect",
        "user-agent",
    ];
    MANAGED.iter().any(|managed| managed.eq_ignore_ascii_case(name))
}
