use crate::vending::error::{VendError, VendResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// HTTP client for reseller gateways. Same retry discipline as the payments
/// side: bounded retries on 5xx, 429 and network failures only. Vend calls
/// that time out must NOT be retried blindly, so callers pass
/// `retry_allowed = false` for delivery requests and rely on requery instead.
#[derive(Clone)]
pub struct VendingHttpClient {
    client: Client,
    provider: &'static str,
    timeout: Duration,
    max_retries: u32,
}

impl VendingHttpClient {
    pub fn new(provider: &'static str, timeout: Duration, max_retries: u32) -> VendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VendError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            provider,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&JsonValue>,
        retry_allowed: bool,
    ) -> VendResult<T> {
        let max_attempts = if retry_allowed { self.max_retries } else { 0 };
        let mut last_error = None;

        for attempt in 0..=max_attempts {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);
            for (k, v) in headers {
                request = request.header(*k, *v);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| VendError::NetworkError {
                message: format!("{} request failed: {}", self.provider, e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            VendError::ProviderError {
                                provider: self.provider.to_string(),
                                message: format!("invalid reseller JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < max_attempts {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(VendError::RateLimitError {
                            message: format!("{} rate limit exceeded", self.provider),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < max_attempts {
                        warn!(
                            provider = self.provider,
                            status = %status,
                            attempt = attempt + 1,
                            "reseller server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(VendError::ProviderError {
                        provider: self.provider.to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(VendError::NetworkError {
            message: format!("{} request failed", self.provider),
        }))
    }
}
