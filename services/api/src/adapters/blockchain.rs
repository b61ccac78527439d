//! services/api/src/adapters/blockchain.rs
//!
//! HTTP client for the edge functions that front the blockchain testnet.
//! Transaction construction and signing happen behind those functions; this
//! adapter only posts JSON and interprets the `success` / `error` envelope.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vidmart_core::domain::{OptInOutcome, RewardReceipt, WalletBalance};
use vidmart_core::ports::{BlockchainGateway, PortError, PortResult};

/// Implements [`BlockchainGateway`] over the edge function HTTP API.
#[derive(Debug, Clone)]
pub struct EdgeFunctionsGateway {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl EdgeFunctionsGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            http: Client::new(),
        }
    }

    async fn call<Req, Resp>(&self, function: &str, body: &Req) -> PortResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, function);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("{function} request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("{function} response unreadable: {e}")))?;
        debug!(function, %status, "blockchain gateway responded");

        decode_envelope(function, &text)
    }
}

/// Reads the `{ success, error, ...payload }` envelope every function answers with.
fn decode_envelope<Resp: DeserializeOwned>(function: &str, text: &str) -> PortResult<Resp> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| PortError::Unexpected(format!("{function} returned invalid JSON: {e}")))?;

    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        warn!(function, error = message, "blockchain gateway reported an error");
        return Err(PortError::Gateway(message.to_string()));
    }
    if value.get("success").and_then(|s| s.as_bool()) != Some(true) {
        return Err(PortError::Gateway(format!("{function} did not succeed")));
    }

    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("{function} returned an unexpected body: {e}")))
}

//=========================================================================================
// Wire Shapes
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressRequest<'a> {
    user_address: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RewardRequest<'a> {
    recipient_address: &'a str,
    amount: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    address: String,
    balance: Decimal,
    algo_balance: u64,
    is_opted_in: bool,
    explorer_url: String,
    asset_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptInResponse {
    #[serde(default)]
    already_opted_in: bool,
    transaction: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewardResponse {
    transaction_id: String,
    confirmed_round: u64,
    amount: Decimal,
    recipient: String,
    explorer_url: String,
}

//=========================================================================================
// `BlockchainGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlockchainGateway for EdgeFunctionsGateway {
    async fn wallet_balance(&self, address: &str) -> PortResult<WalletBalance> {
        let resp: BalanceResponse = self
            .call("algorand-get-balance", &AddressRequest { user_address: address })
            .await?;
        Ok(WalletBalance {
            address: resp.address,
            balance: resp.balance,
            algo_balance: resp.algo_balance,
            is_opted_in: resp.is_opted_in,
            explorer_url: resp.explorer_url,
            asset_id: resp.asset_id,
        })
    }

    async fn prepare_opt_in(&self, address: &str) -> PortResult<OptInOutcome> {
        let resp: OptInResponse = self
            .call("algorand-opt-in", &AddressRequest { user_address: address })
            .await?;
        if resp.already_opted_in {
            return Ok(OptInOutcome::AlreadyOptedIn);
        }
        resp.transaction
            .map(|transaction| OptInOutcome::Prepared { transaction })
            .ok_or_else(|| PortError::Unexpected("opt-in response carried no transaction".into()))
    }

    async fn reward_coins(
        &self,
        recipient: &str,
        amount: u32,
        note: Option<String>,
    ) -> PortResult<RewardReceipt> {
        let resp: RewardResponse = self
            .call(
                "algorand-reward-coins",
                &RewardRequest {
                    recipient_address: recipient,
                    amount,
                    note,
                },
            )
            .await?;
        Ok(RewardReceipt {
            transaction_id: resp.transaction_id,
            confirmed_round: resp.confirmed_round,
            amount: resp.amount,
            recipient: resp.recipient,
            explorer_url: resp.explorer_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_is_a_gateway_failure() {
        let result: PortResult<BalanceResponse> = decode_envelope(
            "algorand-get-balance",
            r#"{"success": false, "error": "account not found"}"#,
        );
        assert!(matches!(result, Err(PortError::Gateway(m)) if m == "account not found"));
    }

    #[test]
    fn missing_success_flag_is_a_gateway_failure() {
        let result: PortResult<OptInResponse> =
            decode_envelope("algorand-opt-in", r#"{"transaction": "AAAA"}"#);
        assert!(matches!(result, Err(PortError::Gateway(_))));
    }

    #[test]
    fn balance_payload_is_decoded() {
        let resp: BalanceResponse = decode_envelope(
            "algorand-get-balance",
            r#"{
                "success": true,
                "address": "WALLET",
                "balance": 12.5,
                "assetBalance": 12.5,
                "isOptedIn": true,
                "algoBalance": 1000000,
                "assetId": 7,
                "explorerUrl": "https://testnet.explorer/address/WALLET"
            }"#,
        )
        .unwrap();
        assert_eq!(resp.balance, "12.5".parse::<Decimal>().unwrap());
        assert!(resp.is_opted_in);
        assert_eq!(resp.asset_id, 7);
    }

    #[test]
    fn already_opted_in_needs_no_transaction() {
        let resp: OptInResponse = decode_envelope(
            "algorand-opt-in",
            r#"{"success": true, "alreadyOptedIn": true, "message": "done"}"#,
        )
        .unwrap();
        assert!(resp.already_opted_in);
        assert!(resp.transaction.is_none());
    }
}
