// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared HTTP retry policy for the cloud and CI clients.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

const MAX_RETRIES: u32 = 5;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

pub(crate) const USER_AGENT: &str = concat!("ghr/", env!("CARGO_PKG_VERSION"));

fn should_retry(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Send a request, retrying 429 and 5xx responses with exponential
/// backoff. Honors `Retry-After` on 429. Network-level errors are
/// retried the same way.
pub(crate) async fn send_with_retry(builder: RequestBuilder) -> Result<Response, reqwest::Error> {
    let mut delay = INITIAL_RETRY_DELAY;
    let mut attempt = 0;

    loop {
        let request = builder.try_clone();
        let response = match request {
            Some(req) => req.send().await,
            // Streaming bodies cannot be cloned; send once without retry.
            None => return builder.send().await,
        };

        match response {
            Ok(resp) if should_retry(resp.status()) && attempt < MAX_RETRIES => {
                let mut sleep_for = delay;
                if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                    if let Some(secs) = resp
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                    {
                        sleep_for = Duration::from_secs(secs);
                    }
                }
                tracing::debug!(
                    status = %resp.status(),
                    attempt,
                    delay_ms = sleep_for.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(sleep_for).await;
            }
            Ok(resp) => return Ok(resp),
            Err(err) if attempt < MAX_RETRIES && err.is_connect() => {
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }

        attempt += 1;
        delay *= 2;
    }
}
