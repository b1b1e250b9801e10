//! 多链钱包服务
//!
//! 钱包生命周期：创建/导入 → 加密存储 → 解锁（临时） → 重新加密。
//! 助记词只在单次操作期间存在于内存中，Mnemonic 被 drop 时清零

use std::{collections::BTreeMap, sync::Arc};

use tracing::{info, warn};

use crate::{
    domain::{
        chain_config::{ChainConfig, ChainRegistry, CurveType},
        derivation::AddressDerivationEngine,
        mnemonic::{Mnemonic, MnemonicService, WordCount},
        seed_vault::SeedEncryptionVault,
        stored_wallet::StoredWallet,
    },
    error::{Result, WalletError},
    metrics,
};

/// 新建钱包的结果，助记词只在这里返回一次
#[derive(Debug)]
pub struct CreatedWallet {
    pub mnemonic: Mnemonic,
    pub stored_wallet: StoredWallet,
}

/// 多链钱包服务
#[derive(Clone)]
pub struct MultiChainWalletService {
    mnemonics: MnemonicService,
    derivation: AddressDerivationEngine,
    vault: SeedEncryptionVault,
}

impl MultiChainWalletService {
    /// 创建服务实例
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self {
            mnemonics: MnemonicService::new(),
            derivation: AddressDerivationEngine::new(registry),
            vault: SeedEncryptionVault::new(),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        self.derivation.registry()
    }

    pub fn derivation(&self) -> &AddressDerivationEngine {
        &self.derivation
    }

    /// 生成新助记词并加密保存
    pub fn create_wallet(&self, password: &str, words: WordCount) -> Result<CreatedWallet> {
        let mnemonic = self.mnemonics.generate(words)?;
        let stored_wallet = self.seal(&mnemonic, password)?;

        info!(
            chains = stored_wallet.addresses.len(),
            words = words.words(),
            "wallet created"
        );
        Ok(CreatedWallet {
            mnemonic,
            stored_wallet,
        })
    }

    /// 导入已有助记词
    pub fn import_wallet(&self, phrase: &str, password: &str) -> Result<StoredWallet> {
        let mnemonic = Mnemonic::parse(phrase)?;
        let stored_wallet = self.seal(&mnemonic, password)?;

        info!(chains = stored_wallet.addresses.len(), "wallet imported");
        Ok(stored_wallet)
    }

    /// 解锁钱包，返回的助记词由调用方在操作结束后丢弃
    pub fn unlock_wallet(&self, wallet: &StoredWallet, password: &str) -> Result<Mnemonic> {
        // 信封格式错误与密码错误不可区分
        let result = wallet
            .envelope()
            .map_err(|_| WalletError::Decryption)
            .and_then(|envelope| self.vault.decrypt(&envelope, password));

        if let Err(e) = &result {
            metrics::inc_unlock_failure();
            warn!(code = e.code(), "wallet unlock failed");
        }
        result
    }

    /// 派生全部链的地址
    pub fn derive_addresses(&self, mnemonic: &Mnemonic) -> Result<BTreeMap<String, String>> {
        let seed = mnemonic.to_seed("")?;
        Ok(self
            .derivation
            .derive_all(&seed)?
            .into_iter()
            .map(|account| (account.chain, account.address))
            .collect())
    }

    /// 导出 JSON 备份
    pub fn export_wallet(&self, wallet: &StoredWallet) -> Result<String> {
        wallet.export_json()
    }

    /// 从 JSON 备份导入
    pub fn import_wallet_from_backup(&self, json: &str) -> Result<StoredWallet> {
        StoredWallet::from_backup_json(json)
    }

    /// 修改密码：用新的盐值和 IV 重新加密，地址和创建时间不变
    pub fn change_password(
        &self,
        wallet: &StoredWallet,
        old_password: &str,
        new_password: &str,
    ) -> Result<StoredWallet> {
        let mnemonic = self.unlock_wallet(wallet, old_password)?;
        let envelope = self.vault.encrypt(&mnemonic, new_password)?;

        info!("wallet password changed");
        Ok(wallet.with_envelope(&envelope))
    }

    /// 验证地址格式
    pub fn validate_address(&self, chain: &str, address: &str) -> Result<bool> {
        self.derivation.validate_address(chain, address)
    }

    /// 按曲线类型列出链
    pub fn list_chains_by_curve(&self, curve_type: CurveType) -> Vec<&ChainConfig> {
        self.registry().get_by_curve_type(curve_type)
    }

    fn seal(&self, mnemonic: &Mnemonic, password: &str) -> Result<StoredWallet> {
        let addresses = self.derive_addresses(mnemonic)?;
        let envelope = self.vault.encrypt(mnemonic, password)?;
        Ok(StoredWallet::new(addresses, &envelope))
    }
}

impl Default for MultiChainWalletService {
    fn default() -> Self {
        Self::new(Arc::new(ChainRegistry::new()))
    }
}
