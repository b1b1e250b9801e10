//! 多链配置模块
//!
//! 定义所有支持的区块链及其加密曲线配置。注册表是启动时构造、之后只读的值，
//! 通过依赖注入传递，测试可以替换为更小的链集合

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::derivation_path::{validate_multi_chain_consistency, HdPath},
    error::{Result, WalletError},
};

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 曲线 (Ethereum 及所有 EVM 兼容链, 原生账本链)
    Secp256k1,
    /// ed25519 曲线 (Solana)
    Ed25519,
    /// sr25519 曲线 (Polkadot/Kusama)，可配置但尚未实现派生
    Sr25519,
}

impl std::fmt::Display for CurveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CurveType::Secp256k1 => "secp256k1",
            CurveType::Ed25519 => "ed25519",
            CurveType::Sr25519 => "sr25519",
        };
        f.write_str(name)
    }
}

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFormat {
    /// 0x + EIP-55 校验和十六进制 (EVM 系列)
    Eip55Hex,
    /// 自定义前缀 + 小写十六进制 (原生账本链)
    PrefixedHex,
    /// 公钥本身的 Base58 编码 (Solana)
    SolanaBase58,
}

/// 链配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 链标识 (ethereum, solana, ...)
    pub id: String,
    /// 链名称
    pub name: String,
    /// 链符号 (ETH, SOL, ...)
    pub symbol: String,
    /// 加密曲线类型
    pub curve_type: CurveType,
    /// 地址格式
    pub address_format: AddressFormat,
    /// 地址前缀，仅 `PrefixedHex` 使用
    #[serde(default)]
    pub address_prefix: String,
    /// BIP44 coin type
    pub coin_type: u32,
    /// 派生路径模板，支持 `{coin_type}` `{account}` `{index}` 占位符
    pub derivation_path_template: String,
    /// RPC 端点，原生账本链为 None
    pub rpc_url: Option<String>,
    /// 浏览器交易链接模板，`{tx}` 替换为交易哈希
    pub explorer_url: String,
    /// 是否为原生账本链（余额和转账走本地账本）
    #[serde(default)]
    pub is_native: bool,
    /// EIP-155 chain id
    #[serde(default)]
    pub evm_chain_id: Option<u64>,
    /// 原生币精度
    pub decimals: u32,
    /// 价格源中的币种 id (CoinGecko)
    #[serde(default)]
    pub price_id: Option<String>,
}

impl ChainConfig {
    /// 生成派生路径
    ///
    /// # Arguments
    /// * `account` - 账户索引 (通常为 0)
    /// * `index` - 地址索引 (通常为 0)
    pub fn derivation_path(&self, account: u32, index: u32) -> String {
        self.derivation_path_template
            .replace("{coin_type}", &self.coin_type.to_string())
            .replace("{account}", &account.to_string())
            .replace("{index}", &index.to_string())
    }

    /// 默认账户 (account 0, index 0) 的派生路径
    pub fn default_derivation_path(&self) -> String {
        self.derivation_path(0, 0)
    }

    /// 交易浏览器链接
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        self.explorer_url.replace("{tx}", tx_hash)
    }

    pub fn is_evm(&self) -> bool {
        !self.is_native
            && self.curve_type == CurveType::Secp256k1
            && self.address_format == AddressFormat::Eip55Hex
    }
}

/// 链配置注册表（按注册顺序保存）
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    configs: Vec<ChainConfig>,
    index: HashMap<String, usize>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for config in default_chains() {
            registry.register(config);
        }
        registry
    }

    /// 空注册表
    pub fn empty() -> Self {
        Self {
            configs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// 从给定配置集合构造，拒绝重复 id
    pub fn from_configs(configs: Vec<ChainConfig>) -> Result<Self> {
        let mut registry = Self::empty();
        for config in configs {
            let key = normalize_id(&config.id);
            if registry.index.contains_key(&key) {
                return Err(WalletError::Config(format!(
                    "duplicate chain id: {}",
                    config.id
                )));
            }
            registry.register(config);
        }
        Ok(registry)
    }

    /// 注册链配置，同 id 覆盖
    pub fn register(&mut self, config: ChainConfig) {
        let key = normalize_id(&config.id);
        match self.index.get(&key) {
            Some(&pos) => self.configs[pos] = config,
            None => {
                self.index.insert(key, self.configs.len());
                self.configs.push(config);
            }
        }
    }

    /// 按 id 覆盖 RPC 端点
    pub fn with_rpc_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (chain_id, url) in overrides {
            if let Some(&pos) = self.index.get(&normalize_id(chain_id)) {
                self.configs[pos].rpc_url = Some(url.clone());
            } else {
                tracing::warn!(chain = %chain_id, "RPC override for unknown chain ignored");
            }
        }
        self
    }

    /// 通过 id 获取配置
    pub fn get(&self, chain_id: &str) -> Result<&ChainConfig> {
        self.find(chain_id)
            .ok_or_else(|| WalletError::UnsupportedChain(chain_id.to_string()))
    }

    pub fn find(&self, chain_id: &str) -> Option<&ChainConfig> {
        self.index
            .get(&normalize_id(chain_id))
            .map(|&pos| &self.configs[pos])
    }

    /// 通过符号获取第一个匹配的配置
    pub fn get_by_symbol(&self, symbol: &str) -> Option<&ChainConfig> {
        self.configs
            .iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
    }

    /// 按曲线类型分组获取所有链
    pub fn get_by_curve_type(&self, curve_type: CurveType) -> Vec<&ChainConfig> {
        self.configs
            .iter()
            .filter(|c| c.curve_type == curve_type)
            .collect()
    }

    /// 列出所有支持的链
    pub fn list(&self) -> &[ChainConfig] {
        &self.configs
    }

    /// 需要走网络 RPC 的链
    pub fn external(&self) -> impl Iterator<Item = &ChainConfig> {
        self.configs.iter().filter(|c| !c.is_native)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// 验证链配置完整性，返回全部问题
    pub fn validate_configs(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut default_paths = Vec::with_capacity(self.configs.len());

        for config in &self.configs {
            if config.id.trim().is_empty() {
                errors.push(format!("Chain {} has empty id", config.name));
            }
            if config.name.is_empty() {
                errors.push(format!("Chain {} has empty name", config.id));
            }
            if config.symbol.is_empty() {
                errors.push(format!("Chain {} has empty symbol", config.id));
            }
            if !config.explorer_url.contains("{tx}") {
                errors.push(format!(
                    "Chain {} explorer_url lacks a {{tx}} placeholder",
                    config.id
                ));
            }
            if !config.is_native && config.rpc_url.as_deref().unwrap_or("").is_empty() {
                errors.push(format!("Chain {} is external but has no rpc_url", config.id));
            }
            if config.is_evm() && config.evm_chain_id.is_none() {
                errors.push(format!("Chain {} is EVM but has no evm_chain_id", config.id));
            }

            match (config.curve_type, config.address_format) {
                (CurveType::Secp256k1, AddressFormat::Eip55Hex) => {}
                (CurveType::Secp256k1, AddressFormat::PrefixedHex) => {
                    if config.address_prefix.is_empty() {
                        errors.push(format!("Chain {} has empty address_prefix", config.id));
                    }
                }
                (CurveType::Ed25519, AddressFormat::SolanaBase58) => {}
                // 尚未实现的曲线由派生时报告 UnsupportedCurve
                (CurveType::Sr25519, _) => {}
                _ => {
                    errors.push(format!(
                        "Chain {} has incompatible curve_type and address_format: {:?} / {:?}",
                        config.id, config.curve_type, config.address_format
                    ));
                }
            }

            match config.default_derivation_path().parse::<HdPath>() {
                Ok(path) => {
                    if config.curve_type == CurveType::Ed25519 && !path.is_fully_hardened() {
                        errors.push(format!(
                            "Chain {} uses ed25519 but its path {} is not fully hardened",
                            config.id, path
                        ));
                    }
                    default_paths.push((config.id.as_str(), path));
                }
                Err(e) => errors.push(format!(
                    "Chain {} has invalid derivation_path_template: {}",
                    config.id, e
                )),
            }
        }

        // 同一助记词在各链的默认账户必须落在相同的 account / address_index
        let paths: Vec<(&str, &HdPath)> = default_paths.iter().map(|(id, p)| (*id, p)).collect();
        if let Err(e) = validate_multi_chain_consistency(&paths) {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn normalize_id(chain_id: &str) -> String {
    chain_id.trim().to_lowercase()
}

const EVM_PATH: &str = "m/44'/{coin_type}'/{account}'/0/{index}";

fn evm_chain(
    id: &str,
    name: &str,
    symbol: &str,
    evm_chain_id: u64,
    rpc_url: &str,
    explorer: &str,
    price_id: &str,
) -> ChainConfig {
    ChainConfig {
        id: id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        curve_type: CurveType::Secp256k1,
        address_format: AddressFormat::Eip55Hex,
        address_prefix: "0x".to_string(),
        // 所有 EVM 链共享以太坊 coin type，同一助记词在各链得到同一地址
        coin_type: 60,
        derivation_path_template: EVM_PATH.to_string(),
        rpc_url: Some(rpc_url.to_string()),
        explorer_url: format!("{}/tx/{{tx}}", explorer),
        is_native: false,
        evm_chain_id: Some(evm_chain_id),
        decimals: 18,
        price_id: Some(price_id.to_string()),
    }
}

/// 默认支持的链
pub fn default_chains() -> Vec<ChainConfig> {
    vec![
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 原生账本链
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        ChainConfig {
            id: "darkwave".to_string(),
            name: "DarkWave Chain".to_string(),
            symbol: "DWT".to_string(),
            curve_type: CurveType::Secp256k1,
            address_format: AddressFormat::PrefixedHex,
            address_prefix: "DW".to_string(),
            coin_type: 9999,
            derivation_path_template: EVM_PATH.to_string(),
            rpc_url: None,
            explorer_url: "/explorer/tx/{tx}".to_string(),
            is_native: true,
            evm_chain_id: Some(7777),
            decimals: 18,
            price_id: None,
        },
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Ed25519 系列
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        ChainConfig {
            id: "solana".to_string(),
            name: "Solana".to_string(),
            symbol: "SOL".to_string(),
            curve_type: CurveType::Ed25519,
            address_format: AddressFormat::SolanaBase58,
            address_prefix: String::new(),
            coin_type: 501,
            derivation_path_template: "m/44'/{coin_type}'/{account}'/0'".to_string(),
            rpc_url: Some("https://api.mainnet-beta.solana.com".to_string()),
            explorer_url: "https://solscan.io/tx/{tx}".to_string(),
            is_native: false,
            evm_chain_id: None,
            decimals: 9,
            price_id: Some("solana".to_string()),
        },
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Secp256k1 / EVM 系列
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        evm_chain(
            "ethereum",
            "Ethereum",
            "ETH",
            1,
            "https://eth.llamarpc.com",
            "https://etherscan.io",
            "ethereum",
        ),
        evm_chain(
            "base",
            "Base",
            "ETH",
            8453,
            "https://mainnet.base.org",
            "https://basescan.org",
            "ethereum",
        ),
        evm_chain(
            "polygon",
            "Polygon",
            "MATIC",
            137,
            "https://polygon-rpc.com",
            "https://polygonscan.com",
            "matic-network",
        ),
        evm_chain(
            "arbitrum",
            "Arbitrum",
            "ETH",
            42161,
            "https://arb1.arbitrum.io/rpc",
            "https://arbiscan.io",
            "ethereum",
        ),
        evm_chain(
            "bsc",
            "BNB Chain",
            "BNB",
            56,
            "https://bsc-dataseed.binance.org",
            "https://bscscan.com",
            "binancecoin",
        ),
        evm_chain(
            "optimism",
            "Optimism",
            "ETH",
            10,
            "https://mainnet.optimism.io",
            "https://optimistic.etherscan.io",
            "ethereum",
        ),
        evm_chain(
            "avalanche",
            "Avalanche",
            "AVAX",
            43114,
            "https://api.avax.network/ext/bc/C/rpc",
            "https://snowtrace.io",
            "avalanche-2",
        ),
    ]
}
