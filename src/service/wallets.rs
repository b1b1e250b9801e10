//! 钱包引擎门面
//!
//! 对外的完整操作面：创建、导入、解锁、派生、余额、发送、备份与改密。
//! 原生链转账走账本的原子转账，外部链交给派发器

use std::{collections::BTreeMap, sync::Arc};

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    domain::{
        chain_config::{ChainConfig, ChainRegistry},
        mnemonic::{Mnemonic, WordCount},
        multi_chain_wallet::{CreatedWallet, MultiChainWalletService},
        stored_wallet::StoredWallet,
    },
    error::{Result, WalletError},
    infrastructure::{log_redact::redact_address, wallet_store::WalletStore},
    service::{
        balance_oracle::{BalanceOracle, BalanceResult},
        native_ledger::NativeLedger,
        transaction_dispatcher::{TransactionDispatcher, TransactionResult},
    },
    utils::{address_validator::AddressValidator, amount::parse_units},
};

pub struct WalletEngine {
    wallets: MultiChainWalletService,
    balances: BalanceOracle,
    dispatcher: TransactionDispatcher,
    ledger: Arc<dyn NativeLedger>,
    store: Arc<dyn WalletStore>,
    words: WordCount,
}

impl WalletEngine {
    pub fn new(
        wallets: MultiChainWalletService,
        balances: BalanceOracle,
        dispatcher: TransactionDispatcher,
        ledger: Arc<dyn NativeLedger>,
        store: Arc<dyn WalletStore>,
    ) -> Self {
        Self {
            wallets,
            balances,
            dispatcher,
            ledger,
            store,
            words: WordCount::default(),
        }
    }

    /// 新钱包的助记词长度
    pub fn with_word_count(mut self, words: WordCount) -> Self {
        self.words = words;
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        self.wallets.registry()
    }

    pub fn supported_chains(&self) -> &[ChainConfig] {
        self.registry().list()
    }

    pub fn store(&self) -> &dyn WalletStore {
        self.store.as_ref()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 钱包生命周期
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn create_wallet(&self, password: &str) -> Result<CreatedWallet> {
        self.wallets.create_wallet(password, self.words)
    }

    pub fn import_wallet(&self, mnemonic: &str, password: &str) -> Result<StoredWallet> {
        self.wallets.import_wallet(mnemonic, password)
    }

    pub fn unlock_wallet(&self, wallet: &StoredWallet, password: &str) -> Result<Mnemonic> {
        self.wallets.unlock_wallet(wallet, password)
    }

    pub fn derive_addresses(&self, mnemonic: &Mnemonic) -> Result<BTreeMap<String, String>> {
        self.wallets.derive_addresses(mnemonic)
    }

    pub fn export_wallet(&self, wallet: &StoredWallet) -> Result<String> {
        self.wallets.export_wallet(wallet)
    }

    pub fn import_wallet_from_backup(&self, json: &str) -> Result<StoredWallet> {
        self.wallets.import_wallet_from_backup(json)
    }

    pub fn validate_address(&self, chain_id: &str, address: &str) -> Result<bool> {
        self.wallets.validate_address(chain_id, address)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 持久化
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 以新生成的 id 保存钱包记录
    pub async fn persist_wallet(&self, wallet: &StoredWallet) -> Result<String> {
        let wallet_id = Uuid::new_v4().simple().to_string();
        self.store.save(&wallet_id, wallet).await?;
        tracing::info!(wallet_id = %wallet_id, "wallet persisted");
        Ok(wallet_id)
    }

    pub async fn load_wallet(&self, wallet_id: &str) -> Result<StoredWallet> {
        self.store.load(wallet_id).await
    }

    pub async fn list_wallets(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    /// 修改已保存钱包的密码，整个读改写在存储锁内完成
    ///
    /// 解密与重新加密在存储的阻塞线程池中执行
    pub async fn change_password(
        &self,
        wallet_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<StoredWallet> {
        let wallets = self.wallets.clone();
        let old_password = Zeroizing::new(old_password.to_string());
        let new_password = Zeroizing::new(new_password.to_string());

        self.store
            .update(
                wallet_id,
                Box::new(move |current| {
                    wallets.change_password(&current, &old_password, &new_password)
                }),
            )
            .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 余额与转账
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn get_balance(&self, chain_id: &str, address: &str) -> Result<BalanceResult> {
        self.balances.get_balance(chain_id, address).await
    }

    /// 并发查询一组 (链 → 地址) 的余额
    pub async fn get_balances_for(
        &self,
        addresses: &BTreeMap<String, String>,
    ) -> BTreeMap<String, BalanceResult> {
        self.balances.get_balances(addresses).await
    }

    /// 钱包内所有链的余额
    pub async fn get_wallet_balances(
        &self,
        wallet: &StoredWallet,
    ) -> BTreeMap<String, BalanceResult> {
        self.get_balances_for(&wallet.addresses).await
    }

    /// 发送原生币
    pub async fn send_transaction(
        &self,
        chain_id: &str,
        mnemonic: &Mnemonic,
        to: &str,
        amount: &str,
    ) -> Result<TransactionResult> {
        let chain = self.registry().get(chain_id)?;
        let seed = mnemonic.to_seed("")?;

        if !chain.is_native {
            return self.dispatcher.send(chain_id, &seed, to, amount).await;
        }

        if !AddressValidator::validate(chain, to) {
            return Err(WalletError::invalid_address(&chain.id, to));
        }
        let value = parse_units(amount, chain.decimals)?;
        let from = self.wallets.derivation().derive(&seed, chain)?.address;

        let tx_hash = self.ledger.transfer(&from, to, value).await?;
        tracing::info!(
            chain = %chain.id,
            from = %redact_address(&from),
            to = %redact_address(to),
            tx_hash = %tx_hash,
            "native ledger transfer"
        );

        Ok(TransactionResult {
            explorer_url: chain.explorer_tx_url(&tx_hash),
            tx_hash,
        })
    }
}
