//! 原生链账本
//!
//! 原生链不走 RPC，余额与转账都由账本直接完成

use std::collections::HashMap;

use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use tokio::sync::Mutex;

use crate::{
    error::{Result, WalletError},
    utils::amount::format_units,
};

#[async_trait]
pub trait NativeLedger: Send + Sync {
    /// 查询余额（最小单位）
    async fn balance(&self, address: &str) -> Result<u128>;

    /// 原子转账，返回交易哈希
    async fn transfer(&self, from: &str, to: &str, amount: u128) -> Result<String>;
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, u128>,
    sequence: u64,
}

/// 内存账本
pub struct InMemoryLedger {
    chain: String,
    decimals: u32,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(chain: impl Into<String>, decimals: u32) -> Self {
        Self {
            chain: chain.into(),
            decimals,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// 直接入账（创世分配、水龙头）
    pub async fn credit(&self, address: &str, amount: u128) -> Result<u128> {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(address.to_string()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::InvalidAmount("balance overflow".to_string()))?;
        Ok(*balance)
    }
}

#[async_trait]
impl NativeLedger for InMemoryLedger {
    async fn balance(&self, address: &str) -> Result<u128> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(address)
            .copied()
            .unwrap_or(0))
    }

    async fn transfer(&self, from: &str, to: &str, amount: u128) -> Result<String> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("0 (must be positive)".to_string()));
        }

        // 扣款与入账在同一把锁内完成
        let mut state = self.state.lock().await;
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                chain: self.chain.clone(),
                required: format_units(amount, self.decimals),
                available: format_units(available, self.decimals),
            });
        }

        let credited = state
            .balances
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| WalletError::InvalidAmount("balance overflow".to_string()))?;

        state.balances.insert(from.to_string(), available - amount);
        // 自转账时以入账为准
        if from != to {
            state.balances.insert(to.to_string(), credited);
        } else {
            state.balances.insert(to.to_string(), available);
        }
        state.sequence += 1;

        let mut hasher = Keccak256::new();
        hasher.update(self.chain.as_bytes());
        hasher.update(from.as_bytes());
        hasher.update(to.as_bytes());
        hasher.update(amount.to_be_bytes());
        hasher.update(state.sequence.to_be_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));

        tracing::info!(chain = %self.chain, seq = state.sequence, "native transfer applied");
        Ok(tx_hash)
    }
}
