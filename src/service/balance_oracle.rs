//! 余额预言机
//!
//! 原生链读本地账本，外部链走只读 RPC。单链失败或超时只降级为零余额，
//! 不会向调用方传播

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};

use crate::{
    domain::chain_config::{ChainConfig, ChainRegistry},
    error::Result,
    infrastructure::log_redact::redact_address,
    metrics::{self, BalanceOutcome},
    service::{
        blockchain_client::BlockchainClient, native_ledger::NativeLedger, price_service::PriceFeed,
    },
    utils::amount::{format_display, to_f64, zero_display},
};

/// 余额查询结果，不落盘
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResult {
    /// 6 位小数的展示金额
    pub balance: String,
    pub usd: f64,
    pub symbol: String,
}

impl BalanceResult {
    pub fn zeroed(symbol: &str) -> Self {
        Self {
            balance: zero_display(),
            usd: 0.0,
            symbol: symbol.to_string(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.balance == zero_display() && self.usd == 0.0
    }
}

pub struct BalanceOracle {
    registry: Arc<ChainRegistry>,
    client: Arc<BlockchainClient>,
    ledger: Arc<dyn NativeLedger>,
    prices: Option<Arc<dyn PriceFeed>>,
    timeout: Duration,
}

impl BalanceOracle {
    pub fn new(
        registry: Arc<ChainRegistry>,
        client: Arc<BlockchainClient>,
        ledger: Arc<dyn NativeLedger>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            ledger,
            prices: None,
            timeout,
        }
    }

    /// 启用法币估值
    pub fn with_price_feed(mut self, prices: Arc<dyn PriceFeed>) -> Self {
        self.prices = Some(prices);
        self
    }

    /// 查询单链余额
    ///
    /// 只有未知链会返回错误；RPC 失败与超时都降级为零余额。
    /// 报价只能使用余额读取后剩余的时间，超时只把 usd 置零
    pub async fn get_balance(&self, chain_id: &str, address: &str) -> Result<BalanceResult> {
        let chain = self.registry.get(chain_id)?;
        let deadline = Instant::now() + self.timeout;

        let base_units = match timeout_at(deadline, self.fetch_base_units(chain, address)).await {
            Ok(Ok(base_units)) => base_units,
            Ok(Err(e)) => {
                metrics::observe_balance(&chain.id, BalanceOutcome::Degraded);
                tracing::warn!(
                    chain = %chain.id,
                    address = %redact_address(address),
                    error = %e,
                    "balance query failed, returning zero"
                );
                return Ok(BalanceResult::zeroed(&chain.symbol));
            }
            Err(_) => {
                metrics::observe_balance(&chain.id, BalanceOutcome::Timeout);
                tracing::warn!(
                    chain = %chain.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "balance query timed out, returning zero"
                );
                return Ok(BalanceResult::zeroed(&chain.symbol));
            }
        };
        metrics::observe_balance(&chain.id, BalanceOutcome::Ok);

        Ok(BalanceResult {
            balance: format_display(base_units, chain.decimals),
            usd: self.usd_value(chain, base_units, deadline).await,
            symbol: chain.symbol.clone(),
        })
    }

    /// 并发查询多链余额，未知链被跳过
    pub async fn get_balances(
        &self,
        addresses: &BTreeMap<String, String>,
    ) -> BTreeMap<String, BalanceResult> {
        let queries = addresses.iter().map(|(chain_id, address)| async move {
            let result = self.get_balance(chain_id, address).await;
            (chain_id.clone(), result)
        });

        join_all(queries)
            .await
            .into_iter()
            .filter_map(|(chain_id, result)| match result {
                Ok(balance) => Some((chain_id, balance)),
                Err(e) => {
                    tracing::warn!(chain = %chain_id, error = %e, "skipping unknown chain");
                    None
                }
            })
            .collect()
    }

    async fn fetch_base_units(&self, chain: &ChainConfig, address: &str) -> Result<u128> {
        if chain.is_native {
            self.ledger.balance(address).await
        } else {
            self.client.get_native_balance(chain, address).await
        }
    }

    /// 价格源失败只影响估值，余额照常返回
    async fn usd_value(&self, chain: &ChainConfig, base_units: u128, deadline: Instant) -> f64 {
        let (Some(prices), Some(price_id)) = (&self.prices, chain.price_id.as_deref()) else {
            return 0.0;
        };
        if base_units == 0 {
            return 0.0;
        }

        match timeout_at(deadline, prices.usd_price(price_id)).await {
            Ok(Ok(price)) => to_f64(base_units, chain.decimals) * price.to_f64().unwrap_or(0.0),
            Ok(Err(e)) => {
                tracing::debug!(chain = %chain.id, price_id, error = %e, "price unavailable");
                0.0
            }
            Err(_) => {
                tracing::debug!(chain = %chain.id, price_id, "price lookup timed out");
                0.0
            }
        }
    }
}
