// 区块链客户端服务
// EVM 与 Solana 的只读查询、广播与确认状态，统一走 RpcTransport

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    domain::chain_config::{ChainConfig, CurveType},
    error::{Result, WalletError},
    infrastructure::upstream::{parse_hex_u128, RpcTransport},
};

/// 外部链的 RPC 方言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl ChainFamily {
    /// 原生链没有 RPC 方言
    pub fn of(chain: &ChainConfig) -> Result<Self> {
        if chain.is_native {
            return Err(WalletError::UnsupportedChain(format!(
                "{} is served by the native ledger",
                chain.id
            )));
        }
        match chain.curve_type {
            CurveType::Secp256k1 if chain.is_evm() => Ok(Self::Evm),
            CurveType::Ed25519 => Ok(Self::Solana),
            _ => Err(WalletError::UnsupportedChain(chain.id.clone())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: Option<u8>, // 1 = success, 0 = failed
}

impl TransactionReceipt {
    pub fn is_failed(&self) -> bool {
        self.status == Some(0)
    }
}

/// Solana 签名确认状态
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    Processed,
    Confirmed,
    Failed(String),
}

pub struct BlockchainClient {
    transport: Arc<dyn RpcTransport>,
}

impl BlockchainClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn call(&self, chain: &ChainConfig, method: &str, params: Value) -> Result<Value> {
        self.transport.call(chain, method, params).await
    }

    /// 原生币余额（最小单位）
    pub async fn get_native_balance(&self, chain: &ChainConfig, address: &str) -> Result<u128> {
        match ChainFamily::of(chain)? {
            ChainFamily::Evm => {
                let result = self
                    .call(chain, "eth_getBalance", json!([address, "latest"]))
                    .await?;
                parse_hex_u128(&chain.id, as_str(chain, &result, "eth_getBalance")?)
            }
            ChainFamily::Solana => {
                let result = self.call(chain, "getBalance", json!([address])).await?;
                result
                    .get("value")
                    .and_then(Value::as_u64)
                    .map(u128::from)
                    .ok_or_else(|| unexpected(chain, "getBalance", &result))
            }
        }
    }

    /// 待定 nonce
    pub async fn get_transaction_count(&self, chain: &ChainConfig, address: &str) -> Result<u64> {
        let result = self
            .call(chain, "eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        let nonce = parse_hex_u128(&chain.id, as_str(chain, &result, "eth_getTransactionCount")?)?;
        u64::try_from(nonce).map_err(|_| unexpected(chain, "eth_getTransactionCount", &result))
    }

    pub async fn get_gas_price(&self, chain: &ChainConfig) -> Result<u128> {
        let result = self.call(chain, "eth_gasPrice", json!([])).await?;
        parse_hex_u128(&chain.id, as_str(chain, &result, "eth_gasPrice")?)
    }

    /// 广播 EVM 原始交易，返回节点给出的交易哈希
    pub async fn send_raw_transaction(&self, chain: &ChainConfig, raw_tx: &str) -> Result<String> {
        let result = self
            .call(chain, "eth_sendRawTransaction", json!([raw_tx]))
            .await?;
        Ok(as_str(chain, &result, "eth_sendRawTransaction")?.to_string())
    }

    /// 查询交易回执，未打包时返回 None
    pub async fn get_transaction_receipt(
        &self,
        chain: &ChainConfig,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>> {
        let result = self
            .call(chain, "eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let hex_field = |name: &str| {
            result
                .get(name)
                .and_then(Value::as_str)
                .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        };

        Ok(Some(TransactionReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: hex_field("blockNumber"),
            gas_used: hex_field("gasUsed"),
            status: hex_field("status").and_then(|s| u8::try_from(s).ok()),
        }))
    }

    /// 最新区块高度（Solana 为 slot）
    pub async fn get_block_number(&self, chain: &ChainConfig) -> Result<u64> {
        match ChainFamily::of(chain)? {
            ChainFamily::Evm => {
                let result = self.call(chain, "eth_blockNumber", json!([])).await?;
                let height = parse_hex_u128(&chain.id, as_str(chain, &result, "eth_blockNumber")?)?;
                u64::try_from(height).map_err(|_| unexpected(chain, "eth_blockNumber", &result))
            }
            ChainFamily::Solana => {
                let result = self.call(chain, "getSlot", json!([])).await?;
                result
                    .as_u64()
                    .ok_or_else(|| unexpected(chain, "getSlot", &result))
            }
        }
    }

    /// 最近区块哈希（32 字节）
    pub async fn get_latest_blockhash(&self, chain: &ChainConfig) -> Result<[u8; 32]> {
        let result = self
            .call(
                chain,
                "getLatestBlockhash",
                json!([{ "commitment": "finalized" }]),
            )
            .await?;
        let blockhash = result
            .get("value")
            .and_then(|v| v.get("blockhash"))
            .and_then(Value::as_str)
            .ok_or_else(|| unexpected(chain, "getLatestBlockhash", &result))?;

        bs58::decode(blockhash)
            .into_vec()
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .ok_or_else(|| WalletError::Rpc {
                chain: chain.id.clone(),
                message: format!("invalid blockhash {}", blockhash),
            })
    }

    /// 广播 Solana 交易（序列化字节，base64 编码发送）
    pub async fn send_solana_transaction(&self, chain: &ChainConfig, tx: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(tx);
        let result = self
            .call(
                chain,
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "skipPreflight": false }]),
            )
            .await?;
        Ok(as_str(chain, &result, "sendTransaction")?.to_string())
    }

    /// 查询签名状态，节点尚未见到时返回 None
    pub async fn get_signature_status(
        &self,
        chain: &ChainConfig,
        signature: &str,
    ) -> Result<Option<SignatureStatus>> {
        let result = self
            .call(
                chain,
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        let entry = result
            .get("value")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .ok_or_else(|| unexpected(chain, "getSignatureStatuses", &result))?;
        if entry.is_null() {
            return Ok(None);
        }

        if let Some(err) = entry.get("err").filter(|e| !e.is_null()) {
            return Ok(Some(SignatureStatus::Failed(err.to_string())));
        }

        let status = match entry.get("confirmationStatus").and_then(Value::as_str) {
            Some("confirmed") | Some("finalized") => SignatureStatus::Confirmed,
            _ => SignatureStatus::Processed,
        };
        Ok(Some(status))
    }
}

fn as_str<'a>(chain: &ChainConfig, value: &'a Value, method: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| unexpected(chain, method, value))
}

fn unexpected(chain: &ChainConfig, method: &str, value: &Value) -> WalletError {
    WalletError::Rpc {
        chain: chain.id.clone(),
        message: format!("unexpected {} result: {}", method, value),
    }
}
