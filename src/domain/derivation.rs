//! 钱包派生策略
//!
//! 为不同的加密曲线提供统一的派生接口：
//! - secp256k1 走 BIP-32
//! - ed25519 走 SLIP-0010（仅硬化派生）
//!
//! 同一 (曲线, 路径) 只派生一次，多个链共享同一把密钥时按各自地址格式编码

use std::{collections::HashMap, fmt, sync::Arc};

use coins_bip32::{path::DerivationPath, xkeys::XPriv};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::{
    domain::{
        chain_config::{AddressFormat, ChainConfig, ChainRegistry, CurveType},
        derivation_path::HdPath,
        mnemonic::Seed,
    },
    error::{Result, WalletError},
    utils::address_validator::{to_checksum_address, AddressValidator},
};

/// 派生结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAccount {
    pub chain: String,
    pub address: String,
    pub derivation_path: String,
}

/// 派生出的私钥，仅在签名期间存在
pub enum DerivedKey {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl DerivedKey {
    pub fn curve(&self) -> CurveType {
        match self {
            DerivedKey::Secp256k1(_) => CurveType::Secp256k1,
            DerivedKey::Ed25519(_) => CurveType::Ed25519,
        }
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey({}, [REDACTED])", self.curve())
    }
}

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    fn curve(&self) -> CurveType;

    /// 沿派生路径从种子派生私钥
    fn derive_key(&self, seed: &Seed, path: &HdPath) -> Result<DerivedKey>;

    /// 按链的地址格式编码公钥
    fn encode_address(&self, key: &DerivedKey, chain: &ChainConfig) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Secp256k1 策略 (EVM 系列, 原生账本链)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Secp256k1Strategy;

impl DerivationStrategy for Secp256k1Strategy {
    fn curve(&self) -> CurveType {
        CurveType::Secp256k1
    }

    fn derive_key(&self, seed: &Seed, path: &HdPath) -> Result<DerivedKey> {
        use k256::ecdsa::SigningKey;

        let derivation_path = path
            .to_string()
            .parse::<DerivationPath>()
            .map_err(|e| WalletError::KeyDerivation(format!("invalid derivation path: {}", e)))?;

        let master_key = XPriv::root_from_seed(seed.as_bytes(), None)
            .map_err(|e| WalletError::KeyDerivation(format!("master key: {}", e)))?;

        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| WalletError::KeyDerivation(format!("child key: {}", e)))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        Ok(DerivedKey::Secp256k1(signing_key.clone()))
    }

    fn encode_address(&self, key: &DerivedKey, chain: &ChainConfig) -> Result<String> {
        let DerivedKey::Secp256k1(signing_key) = key else {
            return Err(WalletError::UnsupportedCurve(key.curve().to_string()));
        };
        let address = evm_address_bytes(signing_key.verifying_key());

        match chain.address_format {
            AddressFormat::Eip55Hex => Ok(to_checksum_address(&address)),
            AddressFormat::PrefixedHex => {
                Ok(format!("{}{}", chain.address_prefix, hex::encode(address)))
            }
            AddressFormat::SolanaBase58 => Err(WalletError::Config(format!(
                "chain {} pairs secp256k1 with a base58 address format",
                chain.id
            ))),
        }
    }
}

/// Keccak-256(未压缩公钥去掉 0x04) 的后 20 字节
pub fn evm_address_bytes(verifying_key: &k256::ecdsa::VerifyingKey) -> [u8; 20] {
    let point = verifying_key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ed25519 策略 (Solana)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type HmacSha512 = Hmac<Sha512>;

const ED25519_CURVE: &[u8] = b"ed25519 seed";

pub struct Ed25519Strategy;

impl Ed25519Strategy {
    /// SLIP-0010 单步派生，返回 (私钥, 链码)
    fn hmac_step(
        key: &[u8],
        data: &[&[u8]],
    ) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
        let mut mac = HmacSha512::new_from_slice(key)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        for chunk in data {
            mac.update(chunk);
        }
        let result = mac.finalize().into_bytes();

        let mut private_key = Zeroizing::new([0u8; 32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        private_key.copy_from_slice(&result[..32]);
        chain_code.copy_from_slice(&result[32..]);
        Ok((private_key, chain_code))
    }
}

impl DerivationStrategy for Ed25519Strategy {
    fn curve(&self) -> CurveType {
        CurveType::Ed25519
    }

    fn derive_key(&self, seed: &Seed, path: &HdPath) -> Result<DerivedKey> {
        if !path.is_fully_hardened() {
            return Err(WalletError::KeyDerivation(format!(
                "ed25519 supports hardened derivation only: {}",
                path
            )));
        }

        let (mut private_key, mut chain_code) =
            Self::hmac_step(ED25519_CURVE, &[&seed.as_bytes()[..]])?;

        for child in path.components() {
            // 0x00 || private_key || index (big-endian)
            let index = child.to_raw().to_be_bytes();
            let (k, c) = Self::hmac_step(
                &chain_code[..],
                &[&[0x00u8][..], &private_key[..], &index[..]],
            )?;
            private_key = k;
            chain_code = c;
        }

        Ok(DerivedKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(
            &private_key,
        )))
    }

    fn encode_address(&self, key: &DerivedKey, chain: &ChainConfig) -> Result<String> {
        let DerivedKey::Ed25519(signing_key) = key else {
            return Err(WalletError::UnsupportedCurve(key.curve().to_string()));
        };

        match chain.address_format {
            // Solana 地址就是公钥的 Base58 编码
            AddressFormat::SolanaBase58 => {
                Ok(bs58::encode(signing_key.verifying_key().to_bytes()).into_string())
            }
            other => Err(WalletError::Config(format!(
                "chain {} pairs ed25519 with address format {:?}",
                chain.id, other
            ))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生策略工厂
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static SECP256K1: Secp256k1Strategy = Secp256k1Strategy;
static ED25519: Ed25519Strategy = Ed25519Strategy;

pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    /// 根据曲线类型选择策略
    pub fn for_curve(curve_type: CurveType) -> Result<&'static dyn DerivationStrategy> {
        match curve_type {
            CurveType::Secp256k1 => Ok(&SECP256K1),
            CurveType::Ed25519 => Ok(&ED25519),
            CurveType::Sr25519 => Err(WalletError::UnsupportedCurve(curve_type.to_string())),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 地址派生引擎
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 地址派生引擎：种子 + 链配置 → 地址 / 签名密钥
#[derive(Clone)]
pub struct AddressDerivationEngine {
    registry: Arc<ChainRegistry>,
}

impl AddressDerivationEngine {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// 默认账户 (account 0, index 0) 的地址
    pub fn derive(&self, seed: &Seed, chain: &ChainConfig) -> Result<DerivedAccount> {
        self.derive_at(seed, chain, 0, 0)
    }

    /// 指定账户和地址索引派生
    ///
    /// 路径模板里没有对应占位符时（例如 Solana 没有地址索引层），非零的索引会被拒绝
    pub fn derive_at(
        &self,
        seed: &Seed,
        chain: &ChainConfig,
        account: u32,
        index: u32,
    ) -> Result<DerivedAccount> {
        let template = &chain.derivation_path_template;
        if account != 0 && !template.contains("{account}") {
            return Err(WalletError::KeyDerivation(format!(
                "chain {} has no account level in {}",
                chain.id, template
            )));
        }
        if index != 0 && !template.contains("{index}") {
            return Err(WalletError::KeyDerivation(format!(
                "chain {} has no address index level in {}",
                chain.id, template
            )));
        }

        let strategy = DerivationStrategyFactory::for_curve(chain.curve_type)?;
        let path: HdPath = chain.derivation_path(account, index).parse()?;
        let key = strategy.derive_key(seed, &path)?;

        Ok(DerivedAccount {
            chain: chain.id.clone(),
            address: strategy.encode_address(&key, chain)?,
            derivation_path: path.to_string(),
        })
    }

    /// 为注册表中每条链派生默认地址（按注册顺序）
    ///
    /// 相同 (曲线, 路径) 的链共享一次派生
    pub fn derive_all(&self, seed: &Seed) -> Result<Vec<DerivedAccount>> {
        let mut keys: HashMap<(CurveType, HdPath), DerivedKey> = HashMap::new();
        let mut accounts = Vec::with_capacity(self.registry.len());

        for chain in self.registry.list() {
            let strategy = DerivationStrategyFactory::for_curve(chain.curve_type)?;
            let path: HdPath = chain.default_derivation_path().parse()?;
            let cache_key = (chain.curve_type, path.clone());

            if !keys.contains_key(&cache_key) {
                let key = strategy.derive_key(seed, &path)?;
                keys.insert(cache_key.clone(), key);
            }
            let key = &keys[&cache_key];

            accounts.push(DerivedAccount {
                chain: chain.id.clone(),
                address: strategy.encode_address(key, chain)?,
                derivation_path: path.to_string(),
            });
        }

        tracing::debug!(
            chains = accounts.len(),
            unique_keys = keys.len(),
            "derived addresses for all chains"
        );
        Ok(accounts)
    }

    /// 为签名重新派生私钥
    pub fn derive_signing_key(&self, seed: &Seed, chain: &ChainConfig) -> Result<DerivedKey> {
        let strategy = DerivationStrategyFactory::for_curve(chain.curve_type)?;
        let path: HdPath = chain.default_derivation_path().parse()?;
        strategy.derive_key(seed, &path)
    }

    /// 签名密钥连同它对应的地址
    pub fn derive_signer(
        &self,
        seed: &Seed,
        chain: &ChainConfig,
    ) -> Result<(DerivedAccount, DerivedKey)> {
        let strategy = DerivationStrategyFactory::for_curve(chain.curve_type)?;
        let path: HdPath = chain.default_derivation_path().parse()?;
        let key = strategy.derive_key(seed, &path)?;
        let account = DerivedAccount {
            chain: chain.id.clone(),
            address: strategy.encode_address(&key, chain)?,
            derivation_path: path.to_string(),
        };
        Ok((account, key))
    }

    /// 验证地址格式
    pub fn validate_address(&self, chain_id: &str, address: &str) -> Result<bool> {
        let chain = self.registry.get(chain_id)?;
        Ok(AddressValidator::validate(chain, address))
    }
}
