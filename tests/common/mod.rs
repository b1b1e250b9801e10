//! 测试辅助模块
//! 脚本化 JSON-RPC 传输、固定价格源和小型链表

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chainvault::{
    app_state::AppState,
    config::Config,
    domain::chain_config::{default_chains, ChainConfig, ChainRegistry},
    error::{Result, WalletError},
    infrastructure::{upstream::RpcTransport, wallet_store::InMemoryWalletStore},
    service::price_service::PriceFeed,
};
use rust_decimal::Decimal;
use serde_json::Value;

/// BIP-39 标准测试助记词
pub const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// ABANDON 在 m/44'/60'/0'/0/0 的地址
pub const ABANDON_EVM_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

/// ABANDON 在 m/44'/501'/0'/0' 的地址
pub const ABANDON_SOLANA_ADDRESS: &str = "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk";

type Scripted = std::result::Result<Value, String>;

/// 按 (链, 方法) 脚本化的传输层
///
/// 队列里只剩一条时重复返回该条；没有脚本的调用视为节点不可达
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<(String, String), VecDeque<Scripted>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, chain: &str, method: &str, value: Value) -> &Self {
        self.push(chain, method, Ok(value))
    }

    pub fn fail(&self, chain: &str, method: &str, reason: &str) -> &Self {
        self.push(chain, method, Err(reason.to_string()))
    }

    /// 该链的每次调用都延迟返回
    pub fn delay(&self, chain: &str, delay: Duration) -> &Self {
        self.delays.lock().unwrap().insert(chain.to_string(), delay);
        self
    }

    /// 某方法的全部调用参数
    pub fn calls_for(&self, method: &str) -> Vec<(String, Value)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == method)
            .map(|(chain, _, params)| (chain.clone(), params.clone()))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn push(&self, chain: &str, method: &str, response: Scripted) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry((chain.to_string(), method.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    fn next(&self, chain: &str, method: &str) -> Option<Scripted> {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(&(chain.to_string(), method.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(&self, chain: &ChainConfig, method: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((chain.id.clone(), method.to_string(), params));

        let delay = self.delays.lock().unwrap().get(&chain.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next(&chain.id, method) {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(WalletError::provider_unavailable(&chain.id, reason)),
            None => Err(WalletError::provider_unavailable(
                &chain.id,
                format!("unscripted call {}", method),
            )),
        }
    }
}

/// 固定报价的价格源，未知币种报错
#[derive(Default)]
pub struct FixedPriceFeed {
    prices: HashMap<String, Decimal>,
}

impl FixedPriceFeed {
    pub fn new(prices: &[(&str, i64)]) -> Arc<Self> {
        Arc::new(Self {
            prices: prices
                .iter()
                .map(|(id, usd)| (id.to_string(), Decimal::from(*usd)))
                .collect(),
        })
    }
}

#[async_trait]
impl PriceFeed for FixedPriceFeed {
    async fn usd_price(&self, price_id: &str) -> Result<Decimal> {
        self.prices
            .get(price_id)
            .copied()
            .ok_or_else(|| WalletError::provider_unavailable("prices", "no quote"))
    }
}

/// 小型链表：原生链 + 两条 EVM 链 + Solana
pub fn test_registry() -> ChainRegistry {
    let wanted = ["darkwave", "ethereum", "base", "solana"];
    ChainRegistry::from_configs(
        default_chains()
            .into_iter()
            .filter(|c| wanted.contains(&c.id.as_str()))
            .collect(),
    )
    .unwrap()
}

/// 快速超时、快速轮询、内存存储
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.balance_timeout_ms = 200;
    config.engine.confirmation_poll_interval_ms = 1;
    config.engine.confirmation_max_attempts = 3;
    config.engine.mnemonic_words = 12;
    config.store.backend = "memory".into();
    config
}

pub fn build_state(
    transport: Arc<ScriptedTransport>,
    prices: Option<Arc<FixedPriceFeed>>,
) -> AppState {
    AppState::assemble(
        Arc::new(test_config()),
        Arc::new(test_registry()),
        transport,
        prices.map(|p| p as Arc<dyn PriceFeed>),
        Arc::new(InMemoryWalletStore::new()),
    )
    .unwrap()
}
