//! JSON-RPC client for avalanchego's P-Chain and info APIs
//!
//! Info calls go through the `avalanche-types` JSON-RPC client. P-Chain
//! calls that client does not cover (paged `getUTXOs`, `getSubnet`, tx
//! status with a drop reason) are posted directly with reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use avalanche_types::jsonrpc::client::info;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::platform::{ClientError, Connector, PlatformClient, SubnetInfo, TxStatus};
use crate::core::ids::{format_address, parse, parse_address};
use crate::core::{Id, NodeId, ShortId, Utxo};
use crate::crypto::{checksummed_hex_decode, checksummed_hex_encode};

const P_CHAIN_PATH: &str = "/ext/bc/P";
const UTXO_PAGE_LIMIT: usize = 1024;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetUtxosResult {
    num_fetched: Value,
    utxos: Vec<String>,
    end_index: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetSubnetResult {
    is_permissioned: bool,
    #[serde(default)]
    control_keys: Vec<String>,
    threshold: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorEntry {
    #[serde(rename = "nodeID")]
    node_id: String,
}

#[derive(Debug, Deserialize)]
struct GetValidatorsResult {
    validators: Vec<ValidatorEntry>,
}

#[derive(Debug, Deserialize)]
struct IssueTxResult {
    #[serde(rename = "txID")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct TxStatusResult {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetIdResult {
    #[serde(rename = "assetID")]
    asset_id: String,
}

/// Numbers come back either as JSON numbers or as decimal strings
fn lenient_u64(method: &'static str, value: &Value) -> Result<u64, ClientError> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ClientError::Malformed {
        method,
        detail: format!("expected an unsigned number, got {}", value),
    })
}

fn parse_subnet(result: GetSubnetResult) -> Result<SubnetInfo, ClientError> {
    let control_keys = result
        .control_keys
        .iter()
        .map(|k| parse_address(k))
        .collect::<Result<Vec<_>, _>>()?;
    let threshold = lenient_u64("platform.getSubnet", &result.threshold)? as u32;
    Ok(SubnetInfo {
        is_permissioned: result.is_permissioned,
        control_keys,
        threshold,
    })
}

/// One `getUTXOs` entry: checksummed hex of the codec bytes
fn decode_utxo(raw: &str) -> Result<Utxo, ClientError> {
    let bytes = checksummed_hex_decode(raw).map_err(|e| ClientError::Malformed {
        method: "platform.getUTXOs",
        detail: e.to_string(),
    })?;
    Ok(Utxo::from_bytes(&bytes)?)
}

fn parse_status(result: TxStatusResult) -> TxStatus {
    match result.status.as_str() {
        "Committed" => TxStatus::Committed,
        "Processing" => TxStatus::Processing,
        "Dropped" | "Aborted" => TxStatus::Dropped(result.reason.unwrap_or_default()),
        _ => TxStatus::Unknown,
    }
}

/// Client for one avalanchego endpoint
pub struct HttpPlatformClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
    network_id: OnceCell<u32>,
}

impl HttpPlatformClient {
    pub fn new(http: Client, endpoint: &str, request_timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            request_timeout,
            network_id: OnceCell::new(),
        }
    }

    /// Run an `avalanche-types` client call under the request timeout
    async fn info_call<T, E, F>(&self, method: &'static str, call: F) -> Result<T, ClientError>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| ClientError::Timeout {
                what: method.to_string(),
                waited: self.request_timeout,
            })?
            .map_err(|e| ClientError::Malformed {
                method,
                detail: e.to_string(),
            })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        method: &'static str,
        params: Value,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.endpoint, path);
        log::debug!("{} -> {}", method, url);

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: RpcResponse<T> = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response.result.ok_or(ClientError::Malformed {
            method,
            detail: "missing result".to_string(),
        })
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_utxos(&self, addrs: &[ShortId]) -> Result<Vec<Utxo>, ClientError> {
        let network_id = self.get_network_id().await?;
        let addresses = addrs
            .iter()
            .map(|a| format_address(a, network_id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut utxos = Vec::new();
        let mut start_index: Option<Value> = None;

        loop {
            let mut params = json!({
                "addresses": addresses,
                "limit": UTXO_PAGE_LIMIT,
                "encoding": "hex",
            });
            if let Some(index) = &start_index {
                params["startIndex"] = index.clone();
            }

            let page: GetUtxosResult = self
                .call(P_CHAIN_PATH, "platform.getUTXOs", params)
                .await?;
            for raw in &page.utxos {
                utxos.push(decode_utxo(raw)?);
            }

            let fetched = lenient_u64("platform.getUTXOs", &page.num_fetched)? as usize;
            if fetched < UTXO_PAGE_LIMIT || page.end_index.is_none() {
                break;
            }
            start_index = page.end_index;
        }

        Ok(utxos)
    }

    async fn get_subnet(&self, subnet_id: Id) -> Result<SubnetInfo, ClientError> {
        let result: GetSubnetResult = self
            .call(
                P_CHAIN_PATH,
                "platform.getSubnet",
                json!({ "subnetID": subnet_id.to_string() }),
            )
            .await?;
        parse_subnet(result)
    }

    async fn get_current_validators(&self, subnet_id: Id) -> Result<Vec<NodeId>, ClientError> {
        let params = if subnet_id.is_empty() {
            json!({})
        } else {
            json!({ "subnetID": subnet_id.to_string() })
        };
        let result: GetValidatorsResult = self
            .call(P_CHAIN_PATH, "platform.getCurrentValidators", params)
            .await?;
        result
            .validators
            .iter()
            .map(|v| parse::<NodeId>("node id", &v.node_id).map_err(ClientError::from))
            .collect()
    }

    async fn issue_tx(&self, tx_bytes: &[u8]) -> Result<Id, ClientError> {
        let result: IssueTxResult = self
            .call(
                P_CHAIN_PATH,
                "platform.issueTx",
                json!({ "tx": checksummed_hex_encode(tx_bytes), "encoding": "hex" }),
            )
            .await?;
        Ok(parse("tx id", &result.tx_id)?)
    }

    async fn get_tx_status(&self, tx_id: Id) -> Result<TxStatus, ClientError> {
        let result: TxStatusResult = self
            .call(
                P_CHAIN_PATH,
                "platform.getTxStatus",
                json!({ "txID": tx_id.to_string() }),
            )
            .await?;
        Ok(parse_status(result))
    }

    async fn get_staking_asset_id(&self) -> Result<Id, ClientError> {
        let result: AssetIdResult = self
            .call(P_CHAIN_PATH, "platform.getStakingAssetID", json!({}))
            .await?;
        Ok(parse("asset id", &result.asset_id)?)
    }

    async fn get_network_id(&self) -> Result<u32, ClientError> {
        let id = self
            .network_id
            .get_or_try_init(|| async {
                let response = self
                    .info_call("info.getNetworkID", info::get_network_id(&self.endpoint))
                    .await?;
                response
                    .result
                    .map(|r| r.network_id)
                    .ok_or(ClientError::Malformed {
                        method: "info.getNetworkID",
                        detail: "missing result".to_string(),
                    })
            })
            .await?;
        Ok(*id)
    }

    async fn get_node_id(&self) -> Result<NodeId, ClientError> {
        let response = self
            .info_call("info.getNodeID", info::get_node_id(&self.endpoint))
            .await?;
        response
            .result
            .map(|r| r.node_id)
            .ok_or(ClientError::Malformed {
                method: "info.getNodeID",
                detail: "missing result".to_string(),
            })
    }
}

/// Opens [`HttpPlatformClient`]s sharing timeouts
#[derive(Debug, Clone)]
pub struct HttpConnector {
    dial_timeout: Duration,
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(dial_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            dial_timeout,
            request_timeout,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn PlatformClient>, ClientError> {
        let http = Client::builder()
            .connect_timeout(self.dial_timeout)
            .timeout(self.request_timeout)
            .build()?;
        Ok(Arc::new(HttpPlatformClient::new(
            http,
            endpoint,
            self.request_timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subnet_accepts_string_threshold() {
        let a = ShortId::from_slice(&[1; 20]);
        let b = ShortId::from_slice(&[2; 20]);
        let raw = json!({
            "isPermissioned": true,
            "controlKeys": [
                format_address(&a, 1337).unwrap(),
                format_address(&b, 1).unwrap().trim_start_matches("P-"),
            ],
            "threshold": "2",
        });
        let parsed = parse_subnet(serde_json::from_value(raw).unwrap()).unwrap();
        assert!(parsed.is_permissioned);
        assert_eq!(parsed.control_keys, vec![a, b]);
        assert_eq!(parsed.threshold, 2);
    }

    #[test]
    fn test_parse_subnet_rejects_cb58_control_keys() {
        let raw = json!({
            "isPermissioned": true,
            "controlKeys": [ShortId::from_slice(&[1; 20]).to_string()],
            "threshold": 1,
        });
        assert!(matches!(
            parse_subnet(serde_json::from_value(raw).unwrap()),
            Err(ClientError::Id(_))
        ));
    }

    #[test]
    fn test_parse_subnet_rejects_bad_threshold() {
        let raw = json!({ "isPermissioned": false, "threshold": "two" });
        assert!(matches!(
            parse_subnet(serde_json::from_value(raw).unwrap()),
            Err(ClientError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_utxo_from_node_hex() {
        let owner = ShortId::from_slice(&[1; 20]);
        let tx_id = Id::from_slice(&[2; 32]);
        let asset_id = Id::from_slice(&[3; 32]);

        let mut bytes = vec![0, 0];
        bytes.extend_from_slice(&[2; 32]);
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        bytes.extend_from_slice(&[3; 32]);
        bytes.extend_from_slice(&[0, 0, 0, 7]);
        bytes.extend_from_slice(&5_000u64.to_be_bytes());
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1]);
        bytes.extend_from_slice(&[1; 20]);

        let utxo = decode_utxo(&checksummed_hex_encode(&bytes)).unwrap();
        assert_eq!(utxo.utxo_id.tx_id, tx_id);
        assert_eq!(utxo.utxo_id.output_index, 1);
        assert_eq!(utxo.output.asset_id, asset_id);
        assert_eq!(utxo.output.amount, 5_000);
        assert_eq!(utxo.output.owners.addrs, vec![owner]);

        // JSON payloads are not UTXO bytes
        let json = checksummed_hex_encode(br#"{"utxo_id":{}}"#);
        assert!(matches!(decode_utxo(&json), Err(ClientError::Codec(_))));
    }

    #[test]
    fn test_parse_status() {
        let status = |s: &str, reason: Option<&str>| {
            parse_status(TxStatusResult {
                status: s.to_string(),
                reason: reason.map(str::to_string),
            })
        };
        assert_eq!(status("Committed", None), TxStatus::Committed);
        assert_eq!(status("Processing", None), TxStatus::Processing);
        assert_eq!(
            status("Dropped", Some("insufficient funds")),
            TxStatus::Dropped("insufficient funds".to_string())
        );
        assert_eq!(status("Whatever", None), TxStatus::Unknown);
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let client = HttpPlatformClient::new(
            Client::new(),
            "http://127.0.0.1:9650/",
            Duration::from_secs(1),
        );
        assert_eq!(client.endpoint(), "http://127.0.0.1:9650");
    }
}
