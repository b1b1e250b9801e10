//! 交易派发
//!
//! 每次发送都从种子重新派生签名密钥，构建并签名链原生转账，广播后等待确认。
//! 同一 (链, 账户) 的发送经账户锁串行，避免 nonce 冲突；广播从不重试。
//!
//! 取消：在广播请求发出前丢弃 `send` 的 future 不会产生任何链上效果；
//! 一旦广播请求已经发出，取消只会停止本地的确认轮询，交易仍可能上链

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    domain::{
        chain_config::ChainConfig,
        derivation::{AddressDerivationEngine, DerivedKey},
        mnemonic::Seed,
    },
    error::{Result, WalletError},
    infrastructure::log_redact::{redact_address, SensitiveRedact},
    metrics,
    service::{
        blockchain_client::{BlockchainClient, ChainFamily, SignatureStatus},
        transaction_builder::{
            EvmTransfer, SolanaTransfer, TransactionBuilder, EVM_TRANSFER_GAS_LIMIT,
            SOLANA_FEE_LAMPORTS,
        },
    },
    utils::{
        address_validator::{parse_evm_address, parse_solana_address, AddressValidator},
        amount::{format_units, parse_units},
    },
};

/// 发送结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub tx_hash: String,
    pub explorer_url: String,
}

type AccountKey = (String, String);
type LockTable = Arc<StdMutex<HashMap<AccountKey, Arc<Mutex<()>>>>>;

/// 按 (链, 账户) 分配的异步锁
///
/// 最后一个持有者释放后条目即被移除
#[derive(Default)]
pub struct AccountLocks {
    locks: LockTable,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, chain: &str, account: &str) -> AccountGuard {
        let key = (chain.to_string(), account.to_string());
        let lock = lock_table(&self.locks)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        AccountGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: self.locks.clone(),
        }
    }

    /// 当前登记的账户数
    pub fn len(&self) -> usize {
        lock_table(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 账户锁守卫
pub struct AccountGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: AccountKey,
    locks: LockTable,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = lock_table(&self.locks);
        // 只剩表里的引用说明没有等待者
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

fn lock_table(
    locks: &StdMutex<HashMap<AccountKey, Arc<Mutex<()>>>>,
) -> MutexGuard<'_, HashMap<AccountKey, Arc<Mutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 确认轮询参数
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

pub struct TransactionDispatcher {
    derivation: AddressDerivationEngine,
    client: Arc<BlockchainClient>,
    builder: TransactionBuilder,
    locks: AccountLocks,
    confirmation: ConfirmationPolicy,
}

impl TransactionDispatcher {
    pub fn new(
        derivation: AddressDerivationEngine,
        client: Arc<BlockchainClient>,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            derivation,
            client,
            builder: TransactionBuilder::new(),
            locks: AccountLocks::new(),
            confirmation,
        }
    }

    /// 发送原生币转账
    ///
    /// `amount` 为十进制展示单位（例如 "0.5" ETH）
    pub async fn send(
        &self,
        chain_id: &str,
        seed: &Seed,
        to: &str,
        amount: &str,
    ) -> Result<TransactionResult> {
        let chain = self.derivation.registry().get(chain_id)?.clone();
        let family = ChainFamily::of(&chain)?;

        if !AddressValidator::validate(&chain, to) {
            return Err(WalletError::invalid_address(&chain.id, to));
        }
        let value = parse_units(amount, chain.decimals)?;

        let (account, key) = self.derivation.derive_signer(seed, &chain)?;
        let _guard = self.locks.acquire(&chain.id, &account.address).await;

        tracing::info!(
            chain = %chain.id,
            from = %redact_address(&account.address),
            to = %redact_address(to),
            "dispatching transfer"
        );

        let tx_hash = match family {
            ChainFamily::Evm => {
                self.send_evm(&chain, &account.address, &key, to, value)
                    .await
            }
            ChainFamily::Solana => {
                self.send_solana(&chain, &account.address, &key, to, value)
                    .await
            }
        }?;

        Ok(TransactionResult {
            explorer_url: chain.explorer_tx_url(&tx_hash),
            tx_hash,
        })
    }

    async fn send_evm(
        &self,
        chain: &ChainConfig,
        from: &str,
        key: &DerivedKey,
        to: &str,
        value: u128,
    ) -> Result<String> {
        let to_bytes =
            parse_evm_address(to).ok_or_else(|| WalletError::invalid_address(&chain.id, to))?;

        let balance = self.client.get_native_balance(chain, from).await?;
        let gas_price = self.client.get_gas_price(chain).await?;
        let fee = gas_price
            .checked_mul(u128::from(EVM_TRANSFER_GAS_LIMIT))
            .ok_or_else(|| WalletError::InvalidAmount("fee overflow".to_string()))?;
        ensure_funds(chain, balance, value, fee)?;

        let nonce = self.client.get_transaction_count(chain, from).await?;
        let signed = self.builder.sign_evm_transfer(
            chain,
            key,
            &EvmTransfer {
                nonce,
                gas_price,
                gas_limit: EVM_TRANSFER_GAS_LIMIT,
                to: to_bytes,
                value,
            },
        )?;
        tracing::debug!(tx = %signed.redact(), nonce, "signed evm transfer");

        let tx_hash = self
            .broadcast(chain, self.client.send_raw_transaction(chain, &signed.raw))
            .await?;
        if !tx_hash.eq_ignore_ascii_case(&signed.tx_hash) {
            tracing::warn!(
                chain = %chain.id,
                node_hash = %tx_hash,
                local_hash = %signed.tx_hash,
                "node reported a different tx hash"
            );
        }

        for attempt in 1..=self.confirmation.max_attempts {
            match self.client.get_transaction_receipt(chain, &tx_hash).await {
                Ok(Some(receipt)) if receipt.is_failed() => {
                    metrics::inc_broadcast_fail(&chain.id);
                    return Err(WalletError::TransactionFailed {
                        chain: chain.id.clone(),
                        tx_hash,
                    });
                }
                Ok(Some(receipt)) => {
                    tracing::info!(
                        chain = %chain.id,
                        tx_hash = %tx_hash,
                        block = ?receipt.block_number,
                        "transaction confirmed"
                    );
                    return Ok(tx_hash);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(chain = %chain.id, attempt, error = %e, "receipt poll failed");
                }
            }
            tokio::time::sleep(self.confirmation.poll_interval).await;
        }

        self.unconfirmed(chain, &tx_hash);
        Ok(tx_hash)
    }

    async fn send_solana(
        &self,
        chain: &ChainConfig,
        from: &str,
        key: &DerivedKey,
        to: &str,
        value: u128,
    ) -> Result<String> {
        let to_bytes =
            parse_solana_address(to).ok_or_else(|| WalletError::invalid_address(&chain.id, to))?;
        let lamports = u64::try_from(value)
            .map_err(|_| WalletError::InvalidAmount(format_units(value, chain.decimals)))?;

        let balance = self.client.get_native_balance(chain, from).await?;
        ensure_funds(chain, balance, value, u128::from(SOLANA_FEE_LAMPORTS))?;

        let recent_blockhash = self.client.get_latest_blockhash(chain).await?;
        let signed = self.builder.sign_solana_transfer(
            chain,
            key,
            &SolanaTransfer {
                to: to_bytes,
                lamports,
                recent_blockhash,
            },
        )?;
        tracing::debug!(tx = %signed.redact(), "signed solana transfer");

        let signature = self
            .broadcast(chain, self.client.send_solana_transaction(chain, &signed.payload))
            .await?;

        for attempt in 1..=self.confirmation.max_attempts {
            match self.client.get_signature_status(chain, &signature).await {
                Ok(Some(SignatureStatus::Confirmed)) => {
                    tracing::info!(
                        chain = %chain.id,
                        signature = %signature,
                        "transaction confirmed"
                    );
                    return Ok(signature);
                }
                Ok(Some(SignatureStatus::Failed(reason))) => {
                    metrics::inc_broadcast_fail(&chain.id);
                    tracing::warn!(
                        chain = %chain.id,
                        signature = %signature,
                        reason = %reason,
                        "transaction failed on chain"
                    );
                    return Err(WalletError::TransactionFailed {
                        chain: chain.id.clone(),
                        tx_hash: signature,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        chain = %chain.id,
                        attempt,
                        error = %e,
                        "signature status poll failed"
                    );
                }
            }
            tokio::time::sleep(self.confirmation.poll_interval).await;
        }

        self.unconfirmed(chain, &signature);
        Ok(signature)
    }

    /// 广播只发一次，失败直接交给调用方
    async fn broadcast(
        &self,
        chain: &ChainConfig,
        send: impl std::future::Future<Output = Result<String>>,
    ) -> Result<String> {
        match send.await {
            Ok(tx_hash) => {
                metrics::inc_broadcast_success(&chain.id);
                tracing::info!(chain = %chain.id, tx_hash = %tx_hash, "transaction broadcast");
                Ok(tx_hash)
            }
            Err(e) => {
                metrics::inc_broadcast_fail(&chain.id);
                tracing::error!(chain = %chain.id, error = %e, "broadcast failed");
                Err(e)
            }
        }
    }

    fn unconfirmed(&self, chain: &ChainConfig, tx_hash: &str) {
        tracing::warn!(
            chain = %chain.id,
            tx_hash,
            attempts = self.confirmation.max_attempts,
            "no confirmation yet, transaction already broadcast"
        );
    }
}

fn ensure_funds(chain: &ChainConfig, balance: u128, value: u128, fee: u128) -> Result<()> {
    let required = value
        .checked_add(fee)
        .ok_or_else(|| WalletError::InvalidAmount("amount overflow".to_string()))?;
    if balance < required {
        return Err(WalletError::InsufficientFunds {
            chain: chain.id.clone(),
            required: format_units(required, chain.decimals),
            available: format_units(balance, chain.decimals),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain_config::ChainRegistry;

    #[tokio::test]
    async fn test_account_locks_serialize_same_account() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire("ethereum", "0xabc").await;

        // 不同链或账户不受影响
        let _other = locks.acquire("base", "0xabc").await;
        let _third = locks.acquire("ethereum", "0xdef").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("ethereum", "0xabc").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_account_locks_are_released() {
        let locks = Arc::new(AccountLocks::new());
        let guard = locks.acquire("ethereum", "0xabc").await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("ethereum", "0xabc").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // 有等待者时条目保留
        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());

        for i in 0..10 {
            let _g = locks.acquire("solana", &format!("acct-{i}")).await;
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn test_ensure_funds_reports_display_units() {
        let registry = ChainRegistry::new();
        let eth = registry.get("ethereum").unwrap();
        let err = ensure_funds(eth, 1_000_000_000_000_000_000, 1_000_000_000_000_000_000, 21_000)
            .unwrap_err();
        match err {
            WalletError::InsufficientFunds {
                required,
                available,
                ..
            } => {
                assert_eq!(required, "1.000000000000021");
                assert_eq!(available, "1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ensure_funds(eth, 10, 5, 5).is_ok());
    }
}
