//! STK-push client for the Daraja sandbox/live API.

use crate::provider::{PaymentProvider, ProviderCredentials, PushPayment};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use shared::{Error, Result};
use std::time::Duration;
use tracing::info;

const DEFAULT_TOKEN_TTL_SECS: i64 = 3599;

#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    pub callback_url: String,
    pub timeout: Duration,
}

pub struct DarajaClient {
    http: reqwest::Client,
    config: DarajaConfig,
}

impl DarajaClient {
    pub fn new(config: DarajaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::internal)?;
        Ok(Self { http, config })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ProviderTimeout
    } else {
        Error::ProviderUnavailable(err.to_string())
    }
}

/// Normalizes a subscriber number to the 254… form the API expects.
fn normalize_msisdn(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with("254") {
        digits
    } else {
        format!("254{}", digits.trim_start_matches('0'))
    }
}

// the sandbox returns expires_in as a string, some environments as a number
fn expires_in_seconds(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        serde_json::Value::String(s) => s.parse().unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        _ => DEFAULT_TOKEN_TTL_SECS,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
}

#[async_trait]
impl PaymentProvider for DarajaClient {
    async fn fetch_credentials(&self) -> Result<ProviderCredentials> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderRejected(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderRejected(e.to_string()))?;
        Ok(ProviderCredentials {
            expires_in: expires_in_seconds(&token.expires_in),
            access_token: token.access_token,
        })
    }

    async fn push_payment(&self, bearer: &str, push: &PushPayment) -> Result<String> {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = BASE64.encode(format!(
            "{}{}{}",
            self.config.short_code, self.config.passkey, timestamp
        ));
        let msisdn = normalize_msisdn(&push.phone);

        let body = serde_json::json!({
            "BusinessShortCode": self.config.short_code,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": push.amount.to_string(),
            "PartyA": msisdn,
            "PartyB": self.config.short_code,
            "PhoneNumber": msisdn,
            "CallBackURL": self.config.callback_url,
            "AccountReference": push.account_reference,
            "TransactionDesc": push.account_reference,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderRejected(format!("{status}: {body}")));
        }

        let accepted: StkPushResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderRejected(e.to_string()))?;
        match accepted.checkout_request_id {
            Some(id) if !id.is_empty() => {
                info!(transaction_id = %id, "Push payment accepted by provider");
                Ok(id)
            }
            _ => Err(Error::ProviderRejected(
                accepted
                    .response_description
                    .unwrap_or_else(|| "missing CheckoutRequestID".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_is_normalized_to_254_prefix() {
        assert_eq!(normalize_msisdn("0712345678"), "254712345678");
        assert_eq!(normalize_msisdn("712345678"), "254712345678");
        assert_eq!(normalize_msisdn("+254712345678"), "254712345678");
        assert_eq!(normalize_msisdn("254712345678"), "254712345678");
        assert_eq!(normalize_msisdn("07 1234 5678"), "254712345678");
    }

    #[test]
    fn expires_in_accepts_string_and_number() {
        assert_eq!(expires_in_seconds(&serde_json::json!("3599")), 3599);
        assert_eq!(expires_in_seconds(&serde_json::json!(1800)), 1800);
        assert_eq!(expires_in_seconds(&serde_json::json!(null)), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(expires_in_seconds(&serde_json::json!("bogus")), DEFAULT_TOKEN_TTL_SECS);
    }
}
