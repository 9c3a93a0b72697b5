use alloy::primitives::Address;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::ClientError;
use crate::objects::rest::{AccountResponse, BaseAccount, ResponseWithHeight};
use crate::objects::tx::{BroadcastMode, BroadcastTxRequest, BroadcastTxResponse, Tx};

/// Typed HTTP client for the consensus chain's REST server.
#[derive(Debug, Clone)]
pub struct HeimdallClient {
    http: Client,
    base_url: Url,
}

impl HeimdallClient {
    /// Create a new `HeimdallClient`.
    ///
    /// * `base_url` – root URL of the REST server (e.g. `http://localhost:1317`
    ///   or `https://proxy.internal/heimdall`). Endpoints resolve below its path.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` below the base URL. A leading `/` does not escape the
    /// base path.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// `GET {path}?{query}` and unwrap the `result` field.
    pub async fn get_result<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        let resp = self.http.get(url).query(query).send().await?;
        let response: ResponseWithHeight<T> = parse_response(resp).await?;
        Ok(response.result)
    }

    /// `GET auth/accounts/{address}` – account number and sequence.
    pub async fn account(&self, address: Address) -> Result<BaseAccount, ClientError> {
        let path = format!("auth/accounts/{address:#x}");
        let account: AccountResponse = self.get_result(&path, &[]).await?;
        Ok(account.into_account())
    }

    /// `GET {endpoint}?txhash=..&logindex=..` – whether the chain already
    /// recorded the event at `(tx_hash, log_index)`.
    pub async fn tx_status(
        &self,
        endpoint: &str,
        tx_hash: &str,
        log_index: u64,
    ) -> Result<bool, ClientError> {
        self.get_result(
            endpoint,
            &[
                ("txhash", tx_hash.to_owned()),
                ("logindex", log_index.to_string()),
            ],
        )
        .await
    }

    /// `POST txs` – submit a signed transaction.
    pub async fn broadcast_tx(
        &self,
        tx: Tx,
        mode: BroadcastMode,
    ) -> Result<BroadcastTxResponse, ClientError> {
        let url = self.endpoint("txs")?;
        let resp = self
            .http
            .post(url)
            .json(&BroadcastTxRequest { tx, mode })
            .send()
            .await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::tx::StdTx;
    use alloy::primitives::address;
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HeimdallClient {
        HeimdallClient::new(Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_account_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/auth/accounts/0x6c468cf8c9879006e22ec4029696e005c2319c9d",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "height": "10",
                "result": {
                    "type": "auth/Account",
                    "value": {
                        "address": "0x6c468cf8c9879006e22ec4029696e005c2319c9d",
                        "account_number": "4",
                        "sequence": "31"
                    }
                }
            })))
            .mount(&server)
            .await;

        let account = client(&server)
            .account(address!("6c468cf8c9879006e22ec4029696e005c2319c9d"))
            .await
            .unwrap();
        assert_eq!(account.account_number, 4);
        assert_eq!(account.sequence, 31);
    }

    #[tokio::test]
    async fn test_tx_status_passes_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topup/isoldtx"))
            .and(query_param("txhash", "0xabc"))
            .and(query_param("logindex", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"height": "0", "result": true})),
            )
            .mount(&server)
            .await;

        let status = client(&server)
            .tx_status("topup/isoldtx", "0xabc", 2)
            .await
            .unwrap();
        assert!(status);
    }

    #[tokio::test]
    async fn test_tx_status_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topup/isoldtx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .tx_status("topup/isoldtx", "0xabc", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topup/isoldtx"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server)
            .tx_status("topup/isoldtx", "0xabc", 2)
            .await
            .unwrap_err();
        match err {
            ClientError::Api { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_tx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txs"))
            .and(body_partial_json(json!({"mode": "async"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"height": "0", "txhash": "ABCD"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tx = Tx::Std(StdTx {
            msg: json!({"type": "topup/MsgTopup", "value": {}}),
            signature: String::new(),
            memo: String::new(),
        });
        let response = client(&server)
            .broadcast_tx(tx, BroadcastMode::Async)
            .await
            .unwrap();
        assert_eq!(response.txhash, "ABCD");
        assert!(!response.is_rejected());
    }

    #[tokio::test]
    async fn test_endpoints_stay_below_base_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/heimdall/auth/accounts/0x6c468cf8c9879006e22ec4029696e005c2319c9d",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "address": "0x6c468cf8c9879006e22ec4029696e005c2319c9d",
                    "account_number": "1",
                    "sequence": "2"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/heimdall/clerk/isoldtx"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"height": "0", "result": false})),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/heimdall/txs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"txhash": "EF01"})))
            .expect(1)
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/heimdall", server.uri())).unwrap();
        let client = HeimdallClient::new(base);
        assert_eq!(client.base_url().path(), "/heimdall/");

        let account = client
            .account(address!("6c468cf8c9879006e22ec4029696e005c2319c9d"))
            .await
            .unwrap();
        assert_eq!(account.sequence, 2);
        assert!(!client.tx_status("clerk/isoldtx", "0xabc", 0).await.unwrap());
        assert!(!client.tx_status("/clerk/isoldtx", "0xabc", 0).await.unwrap());
        let tx = Tx::Std(StdTx {
            msg: json!({"type": "clerk/MsgEventRecord", "value": {}}),
            signature: String::new(),
            memo: String::new(),
        });
        let response = client.broadcast_tx(tx, BroadcastMode::Async).await.unwrap();
        assert_eq!(response.txhash, "EF01");
    }
}
