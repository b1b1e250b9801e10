//! 上游链 JSON-RPC 传输层：带超时/重试的最小实现
//!
//! 只读请求在传输失败时指数回退重试；广播类请求只发送一次，由调用方决定是否重试

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::chain_config::ChainConfig,
    error::{Result, WalletError},
    metrics,
};

/// 不可重放的广播方法
const BROADCAST_METHODS: &[&str] = &["eth_sendRawTransaction", "sendTransaction"];

/// JSON-RPC 传输抽象，测试中替换为脚本化实现
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// 调用链的 RPC 端点，返回 `result` 字段
    async fn call(&self, chain: &ChainConfig, method: &str, params: Value) -> Result<Value>;
}

#[derive(Clone)]
pub struct HttpRpcTransport {
    client: reqwest::Client,
    retries: usize,
}

impl HttpRpcTransport {
    pub fn new(timeout: Duration, retries: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, retries })
    }

    async fn post_once(
        &self,
        chain: &ChainConfig,
        url: &str,
        body: &JsonRpcRequest<'_>,
    ) -> Result<Value> {
        let start = Instant::now();
        let res = self.client.post(url).json(body).send().await;

        let resp = match res {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                metrics::observe_rpc_latency_ms(start.elapsed().as_millis(), false);
                return Err(WalletError::provider_unavailable(
                    &chain.id,
                    format!("http status {}", resp.status()),
                ));
            }
            Err(e) => {
                metrics::observe_rpc_latency_ms(start.elapsed().as_millis(), false);
                return Err(WalletError::provider_unavailable(&chain.id, e));
            }
        };

        let parsed = resp.json::<JsonRpcResponse>().await;
        metrics::observe_rpc_latency_ms(start.elapsed().as_millis(), parsed.is_ok());
        let parsed = parsed.map_err(|e| WalletError::Rpc {
            chain: chain.id.clone(),
            message: format!("malformed response: {}", e),
        })?;

        parsed.into_result(&chain.id)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, chain: &ChainConfig, method: &str, params: Value) -> Result<Value> {
        let url = chain
            .rpc_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                WalletError::provider_unavailable(&chain.id, "no rpc endpoint configured")
            })?;

        let body = JsonRpcRequest::new(method, params);
        let retries = if BROADCAST_METHODS.contains(&method) {
            0
        } else {
            self.retries
        };

        let mut attempt = 0usize;
        loop {
            match self.post_once(chain, url, &body).await {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    tracing::debug!(chain = %chain.id, method, attempt, error = %e, "rpc retry");
                    let backoff = 50 * (1u64 << attempt.min(5)); // 简单指数回退，最大 ~1600ms
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                other => return other,
            }
        }
    }
}

#[derive(Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        }
    }
}

#[derive(Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    pub fn into_result(self, chain: &str) -> Result<Value> {
        if let Some(error) = self.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(WalletError::Rpc {
                chain: chain.to_string(),
                message,
            });
        }
        // `result: null` 是合法响应（例如尚未上链的收据）
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// 解析 `0x` 前缀的十六进制数量
pub fn parse_hex_u128(chain: &str, s: &str) -> Result<u128> {
    let trimmed = s.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(trimmed, 16).map_err(|e| WalletError::Rpc {
        chain: chain.to_string(),
        message: format!("invalid hex quantity {}: {}", s, e),
    })
}
