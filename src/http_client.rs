use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 3;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http client unavailable: {0}")]
    Build(anyhow::Error),
}

/// Sends a GET request with bounded retries and returns the response body.
/// 429 waits out the Retry-After hint (linear backoff when absent), 5xx and
/// transport errors wait one second; any other non-2xx fails immediately.
pub fn get_with_retry(build: impl Fn() -> RequestBuilder) -> Result<String, FetchError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let last = attempt > MAX_RETRIES;

        match build().send() {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS && !last {
                    let delay = retry_after_secs(&resp).unwrap_or(attempt as u64);
                    warn!(attempt, delay_secs = delay, "rate limited, backing off");
                    thread::sleep(Duration::from_secs(delay));
                    continue;
                }
                if status.is_server_error() && !last {
                    warn!(attempt, status = %status, "server error, retrying");
                    thread::sleep(Duration::from_secs(1));
                    continue;
                }
                let body = resp.text()?;
                if !status.is_success() {
                    return Err(FetchError::Status { status, body });
                }
                return Ok(body);
            }
            Err(err) => {
                if last {
                    return Err(FetchError::Transport(err));
                }
                warn!(attempt, error = %err, "network error, retrying");
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

fn retry_after_secs(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
