//! JSON-RPC ledger backend
//!
//! Requests go over HTTP. Each log subscription opens its own WebSocket so
//! that dropping the receiver tears down exactly one server-side subscription.

use super::{
    parse_transaction_error, AccountSnapshot, LedgerRpc, LogNotification, LogReceiver, SignatureStatus,
    LOG_CHANNEL_CAPACITY,
};
use crate::error::RpcError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::StreamExt;
use jsonrpsee::{
    core::client::{ClientT, SubscriptionClientT},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
    ws_client::WsClientBuilder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use std::{str::FromStr, time::Duration};
use tokio::sync::mpsc;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct Context {
    slot: u64,
}

#[derive(Deserialize)]
struct WithContext<T> {
    context: Context,
    value: T,
}

#[derive(Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    slot: u64,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

#[derive(Deserialize)]
struct UiLogs {
    signature: String,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    logs: Vec<String>,
}

fn commitment_str(commitment: CommitmentConfig) -> &'static str {
    match commitment.commitment {
        CommitmentLevel::Processed => "processed",
        CommitmentLevel::Confirmed => "confirmed",
        CommitmentLevel::Finalized => "finalized",
    }
}

fn parse_confirmation(status: Option<&str>) -> CommitmentLevel {
    match status {
        Some("finalized") => CommitmentLevel::Finalized,
        Some("confirmed") => CommitmentLevel::Confirmed,
        _ => CommitmentLevel::Processed,
    }
}

fn invalid(what: &str, e: impl std::fmt::Display) -> RpcError {
    RpcError::InvalidResponse(format!("{what}: {e}"))
}

/// Ledger reached through a validator's JSON-RPC and pubsub endpoints
pub struct JsonRpcLedger {
    http: HttpClient,
    ws_url: String,
}

impl JsonRpcLedger {
    pub fn new(rpc_url: &str, ws_url: &str) -> Result<Self, RpcError> {
        let http = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(rpc_url)?;

        Ok(Self {
            http,
            ws_url: ws_url.to_string(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: jsonrpsee::core::params::ArrayParams,
    ) -> Result<T, RpcError> {
        let value: Value = self.http.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| invalid(method, e))
    }
}

#[async_trait]
impl LedgerRpc for JsonRpcLedger {
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        let params = rpc_params![
            address.to_string(),
            json!({ "encoding": "base64", "commitment": commitment_str(commitment) })
        ];
        let response: WithContext<Option<UiAccount>> = self.call("getAccountInfo", params).await?;

        let Some(account) = response.value else {
            return Ok(None);
        };
        let data = BASE64
            .decode(account.data.0)
            .map_err(|e| invalid("account data", e))?;
        let owner = Pubkey::from_str(&account.owner).map_err(|e| invalid("account owner", e))?;

        Ok(Some(AccountSnapshot {
            slot: response.context.slot,
            lamports: account.lamports,
            owner,
            data,
        }))
    }

    async fn get_balance(&self, owner: &Pubkey, commitment: CommitmentConfig) -> Result<u64, RpcError> {
        let params = rpc_params![
            owner.to_string(),
            json!({ "commitment": commitment_str(commitment) })
        ];
        let response: WithContext<u64> = self.call("getBalance", params).await?;
        Ok(response.value)
    }

    async fn latest_blockhash(&self, commitment: CommitmentConfig) -> Result<Hash, RpcError> {
        let params = rpc_params![json!({ "commitment": commitment_str(commitment) })];
        let response: WithContext<UiBlockhash> = self.call("getLatestBlockhash", params).await?;
        Hash::from_str(&response.value.blockhash).map_err(|e| invalid("blockhash", e))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let wire = bincode::serialize(transaction).map_err(|e| RpcError::Transport(e.to_string()))?;
        // Preflight off: program errors surface through the signature status
        let params = rpc_params![
            BASE64.encode(wire),
            json!({ "encoding": "base64", "skipPreflight": true })
        ];
        let signature: String = self.call("sendTransaction", params).await?;
        Signature::from_str(&signature).map_err(|e| invalid("signature", e))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RpcError> {
        let params = rpc_params![vec![signature.to_string()]];
        let response: WithContext<Vec<Option<UiSignatureStatus>>> =
            self.call("getSignatureStatuses", params).await?;

        Ok(response.value.into_iter().next().flatten().map(|status| SignatureStatus {
            slot: status.slot,
            confirmation: parse_confirmation(status.confirmation_status.as_deref()),
            err: status.err.as_ref().map(parse_transaction_error),
        }))
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, RpcError> {
        let signature: String = self
            .call("requestAirdrop", rpc_params![to.to_string(), lamports])
            .await?;
        Signature::from_str(&signature).map_err(|e| invalid("signature", e))
    }

    async fn subscribe_logs(
        &self,
        program_id: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<LogReceiver, RpcError> {
        let ws = WsClientBuilder::default().build(&self.ws_url).await?;
        let params = rpc_params![
            json!({ "mentions": [program_id.to_string()] }),
            json!({ "commitment": commitment_str(commitment) })
        ];
        let mut subscription = ws
            .subscribe::<WithContext<UiLogs>, _>("logsSubscribe", params, "logsUnsubscribe")
            .await?;

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let program_id = *program_id;

        tokio::spawn(async move {
            tracing::debug!("Log subscription for {} opened", program_id);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    item = subscription.next() => match item {
                        Some(Ok(notification)) => {
                            let notification = LogNotification {
                                slot: notification.context.slot,
                                signature: notification.value.signature,
                                failed: notification.value.err.is_some(),
                                logs: notification.value.logs,
                            };
                            if tx.send(notification).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Malformed log notification: {}", e);
                        }
                        None => {
                            tracing::warn!("Log subscription for {} closed by server", program_id);
                            break;
                        }
                    }
                }
            }
            if let Err(e) = subscription.unsubscribe().await {
                tracing::debug!("logsUnsubscribe failed: {}", e);
            }
            // `ws` drops here, closing the socket
            drop(ws);
            tracing::debug!("Log subscription for {} closed", program_id);
        });

        Ok(rx)
    }
}
