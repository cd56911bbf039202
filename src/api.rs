use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{BalanceError, Result};

/// Query string shared by both balance endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceQuery {
    pub network: String,
    pub address: String,
    pub limit: u32,
    pub page: u32,
    pub include_null_balances: bool,
}

/// One entry of `/balances/native`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNativeBalance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    /// Older responses carried the amount here
    #[serde(default, deserialize_with = "lenient_string")]
    pub balance: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Unit price in USD
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
}

/// One entry of `/balances`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTokenBalance {
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub decimals: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    /// Unit price in USD
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<Vec<T>>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// Prices arrive as numbers or numeric strings; anything else is no price.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|price| price.is_finite()))
}

/// The two read-only endpoints of the token API.
#[async_trait]
pub trait TokenApi: Send + Sync {
    async fn native_balances(&self, query: &BalanceQuery) -> Result<Vec<RawNativeBalance>>;

    async fn token_balances(&self, query: &BalanceQuery) -> Result<Vec<RawTokenBalance>>;
}

#[async_trait]
impl<T: TokenApi + ?Sized> TokenApi for Arc<T> {
    async fn native_balances(&self, query: &BalanceQuery) -> Result<Vec<RawNativeBalance>> {
        (**self).native_balances(query).await
    }

    async fn token_balances(&self, query: &BalanceQuery) -> Result<Vec<RawTokenBalance>> {
        (**self).token_balances(query).await
    }
}

/// Token API over HTTPS, one pooled connection set per instance.
#[derive(Debug, Clone)]
pub struct HttpTokenApi {
    client: Client,
    base_url: String,
}

impl HttpTokenApi {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            BalanceError::Configuration("API key contains characters not allowed in a header".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| BalanceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &BalanceQuery) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, network = %query.network, page = query.page, "requesting balances");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "upstream rejected request");
            return Err(BalanceError::from_status(status.as_u16()));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            if e.is_decode() {
                BalanceError::InvalidResponse(e.to_string())
            } else {
                request_error(e)
            }
        })?;
        Ok(envelope.data.unwrap_or_default())
    }
}

fn request_error(err: reqwest::Error) -> BalanceError {
    if err.is_timeout() {
        BalanceError::Timeout
    } else {
        BalanceError::Transport(err.to_string())
    }
}

#[async_trait]
impl TokenApi for HttpTokenApi {
    async fn native_balances(&self, query: &BalanceQuery) -> Result<Vec<RawNativeBalance>> {
        self.get("balances/native", query).await
    }

    async fn token_balances(&self, query: &BalanceQuery) -> Result<Vec<RawTokenBalance>> {
        self.get("balances", query).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: &str = "0x1fA33c1CA2d733C895BeFf7a3d468Cee317Be253";

    fn query(page: u32) -> BalanceQuery {
        BalanceQuery {
            network: "mainnet".to_string(),
            address: ADDRESS.to_string(),
            limit: 10,
            page,
            include_null_balances: false,
        }
    }

    fn json(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "application/json")
    }

    fn api_for(server: &MockServer, timeout: Duration) -> HttpTokenApi {
        HttpTokenApi::new("secret", &format!("{}/v1/evm", server.uri()), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_token_page_request_and_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/evm/balances"))
            .and(query_param("network", "mainnet"))
            .and(query_param("address", ADDRESS))
            .and(query_param("page", "2"))
            .and(query_param("limit", "10"))
            .and(query_param("include_null_balances", "false"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(json(
                r#"{"data":[{"contract":"0xa0b8","name":"USD Coin","symbol":"USDC","decimals":6,"amount":"1500000","value":1.0,"network":"mainnet"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = api_for(&server, Duration::from_secs(5))
            .token_balances(&query(2))
            .await
            .unwrap();

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol.as_deref(), Some("USDC"));
        assert_eq!(tokens[0].decimals, Some(6));
        assert_eq!(tokens[0].amount.as_deref(), Some("1500000"));
        assert_eq!(tokens[0].value, Some(1.0));
    }

    #[tokio::test]
    async fn test_native_amount_and_legacy_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/evm/balances/native"))
            .and(query_param("include_null_balances", "true"))
            .respond_with(json(
                r#"{"data":[{"address":"0x1","balance":12,"symbol":"ETH","value":"3100.5","network":"mainnet"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut q = query(1);
        q.include_null_balances = true;
        let natives = api_for(&server, Duration::from_secs(5))
            .native_balances(&q)
            .await
            .unwrap();

        assert_eq!(natives.len(), 1);
        assert_eq!(natives[0].amount, None);
        assert_eq!(natives[0].balance.as_deref(), Some("12"));
        assert_eq!(natives[0].symbol.as_deref(), Some("ETH"));
        assert_eq!(natives[0].value, Some(3100.5));
    }

    #[tokio::test]
    async fn test_prices_decode_leniently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/evm/balances"))
            .respond_with(json(
                r#"{"data":[
                    {"symbol":"A","decimals":18,"amount":"1","value":"1.0"},
                    {"symbol":"B","decimals":18,"amount":"2","value":2.0},
                    {"symbol":"C","decimals":18,"amount":"3","value":"n/a"},
                    {"symbol":"D","decimals":18,"amount":"4","value":{"usd":4}},
                    {"symbol":"E","decimals":18,"amount":"5","value":null}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let tokens = api_for(&server, Duration::from_secs(5))
            .token_balances(&query(1))
            .await
            .unwrap();

        let prices: Vec<Option<f64>> = tokens.iter().map(|t| t.value).collect();
        assert_eq!(prices, vec![Some(1.0), Some(2.0), None, None, None]);
    }

    #[tokio::test]
    async fn test_missing_data_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(json(r#"{"data":null}"#))
            .mount(&server)
            .await;

        let api = api_for(&server, Duration::from_secs(5));
        assert!(api.token_balances(&query(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        for (status, expected) in [
            (401, BalanceError::Authentication),
            (403, BalanceError::Authorization),
            (429, BalanceError::RateLimited),
            (500, BalanceError::UpstreamStatus(500)),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1/evm/balances"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = api_for(&server, Duration::from_secs(5))
                .token_balances(&query(1))
                .await
                .unwrap_err();
            assert_eq!(err, expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(json("not json"))
            .mount(&server)
            .await;

        let err = api_for(&server, Duration::from_secs(5))
            .token_balances(&query(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BalanceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(json(r#"{"data":[]}"#).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = api_for(&server, Duration::from_millis(200))
            .token_balances(&query(1))
            .await
            .unwrap_err();
        assert_eq!(err, BalanceError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let api = HttpTokenApi::new("secret", &base_url, Duration::from_secs(5)).unwrap();
        let err = api.token_balances(&query(1)).await.unwrap_err();
        assert!(matches!(err, BalanceError::Transport(_)));
    }

    #[test]
    fn test_header_rejects_control_characters() {
        let err = HttpTokenApi::new("bad\nkey", "http://localhost", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, BalanceError::Configuration(_)));
    }
}
