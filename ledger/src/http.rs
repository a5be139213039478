//! JSON-over-HTTP ledger client.
//!
//! Talks to a ledger node exposing:
//!
//! | Method | Path               | Body                  | Response              |
//! |--------|--------------------|-----------------------|-----------------------|
//! | GET    | `/ledger/height`   |                       | `{"height": u64}`     |
//! | POST   | `/ledger/estimate` | `{account_key, digest}` | `{"cost": u64}`     |
//! | POST   | `/ledger/register` | `{account_key, digest}` | `{"token": string}` |
//! | POST   | `/ledger/verify`   | `{digest}`            | `{"registered": bool}`|
//! | POST   | `/ledger/exists`   | `{account_key}`       | `{"registered": bool}`|
//!
//! Failures carry `{"error": string}`. 402 means insufficient resources, 409
//! means the ledger rejected the write; anything else is treated as the
//! ledger being unavailable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use faceid_types::{AccountKey, ConfirmationToken, DescriptorDigest};

use crate::{LedgerClient, LedgerError};

/// Default request timeout. The backend applies tighter bounds per call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub account_key: AccountKey,
    pub digest: DescriptorDigest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestRequest {
    pub digest: DescriptorDigest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    pub account_key: AccountKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightResponse {
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostResponse {
    pub cost: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: ConfirmationToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredResponse {
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct HttpLedgerClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, LedgerError> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(map_send_error)?;
        decode_response(response).await
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, LedgerError> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;
        decode_response(response).await
    }
}

fn map_send_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Unavailable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        LedgerError::Unavailable(format!("connection failed: {e}"))
    } else {
        LedgerError::Unavailable(e.to_string())
    }
}

async fn decode_response<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, LedgerError> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP status {status}"),
        };
        return Err(match status {
            StatusCode::PAYMENT_REQUIRED => LedgerError::InsufficientResources(message),
            StatusCode::CONFLICT => LedgerError::Rejected(message),
            _ => LedgerError::Unavailable(message),
        });
    }
    response
        .json()
        .await
        .map_err(|e| LedgerError::InvalidResponse(format!("failed to parse ledger response: {e}")))
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn block_height(&self) -> Result<u64, LedgerError> {
        let body: HeightResponse = self.get("/ledger/height").await?;
        Ok(body.height)
    }

    async fn estimate_registration_cost(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<u64, LedgerError> {
        let request = RegistrationRequest {
            account_key: account_key.clone(),
            digest: *digest,
        };
        let body: CostResponse = self.post("/ledger/estimate", &request).await?;
        Ok(body.cost)
    }

    async fn submit_registration(
        &self,
        account_key: &AccountKey,
        digest: &DescriptorDigest,
    ) -> Result<ConfirmationToken, LedgerError> {
        let request = RegistrationRequest {
            account_key: account_key.clone(),
            digest: *digest,
        };
        let body: TokenResponse = self.post("/ledger/register", &request).await?;
        Ok(body.token)
    }

    async fn digest_registered(&self, digest: &DescriptorDigest) -> Result<bool, LedgerError> {
        let body: RegisteredResponse = self
            .post("/ledger/verify", &DigestRequest { digest: *digest })
            .await?;
        Ok(body.registered)
    }

    async fn account_registered(&self, account_key: &AccountKey) -> Result<bool, LedgerError> {
        let request = AccountRequest {
            account_key: account_key.clone(),
        };
        let body: RegisteredResponse = self.post("/ledger/exists", &request).await?;
        Ok(body.registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let client = HttpLedgerClient::new("http://127.0.0.1:8545/");
        assert_eq!(client.url("/ledger/height"), "http://127.0.0.1:8545/ledger/height");
    }

    #[test]
    fn registration_request_wire_format() {
        let request = RegistrationRequest {
            account_key: AccountKey::new("a@x.com"),
            digest: DescriptorDigest::new([0xab; 32]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["account_key"], "a@x.com");
        assert_eq!(json["digest"], "ab".repeat(32));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on loopback is closed on test machines.
        let client = HttpLedgerClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(500));
        assert!(matches!(
            client.block_height().await,
            Err(LedgerError::Unavailable(_))
        ));
    }
}
