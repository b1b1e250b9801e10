//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "CHAINVAULT_CONFIG";

/// 单链 RPC 覆盖的环境变量前缀，例如 `RPC_URL_ETHEREUM`
pub const RPC_OVERRIDE_ENV_PREFIX: &str = "RPC_URL_";

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub ansi: bool,
    pub with_target: bool,
}

/// 引擎配置（超时、价格源、确认轮询）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 单链余额查询超时
    pub balance_timeout_ms: u64,
    /// 单次 RPC HTTP 超时
    pub rpc_timeout_ms: u64,
    /// 只读 RPC 的重试次数
    pub rpc_retries: usize,
    pub price_feed_enabled: bool,
    pub price_feed_url: String,
    pub price_cache_ttl_secs: u64,
    pub confirmation_poll_interval_ms: u64,
    pub confirmation_max_attempts: u32,
    /// 新钱包助记词长度 (12 或 24)
    pub mnemonic_words: usize,
}

/// 钱包存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: String, // "file" or "memory"
    pub path: String,
}

/// 链配置覆盖
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// chainId → RPC URL
    pub rpc_overrides: HashMap<String, String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            ansi: env_or("LOG_ANSI", true),
            with_target: env_or("LOG_WITH_TARGET", true),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            balance_timeout_ms: env_or("BALANCE_TIMEOUT_MS", 5_000),
            rpc_timeout_ms: env_or("RPC_TIMEOUT_MS", 10_000),
            rpc_retries: env_or("RPC_RETRIES", 2),
            price_feed_enabled: env_or("PRICE_FEED_ENABLED", true),
            price_feed_url: std::env::var("PRICE_FEED_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".into()),
            price_cache_ttl_secs: env_or("PRICE_CACHE_TTL_SECS", 300),
            confirmation_poll_interval_ms: env_or("CONFIRM_POLL_INTERVAL_MS", 2_000),
            confirmation_max_attempts: env_or("CONFIRM_MAX_ATTEMPTS", 30),
            mnemonic_words: env_or("WALLET_MNEMONIC_WORDS", 12),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: std::env::var("WALLET_STORE_BACKEND").unwrap_or_else(|_| "file".into()),
            path: std::env::var("WALLET_STORE_PATH").unwrap_or_else(|_| "./wallets".into()),
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        let rpc_overrides = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(RPC_OVERRIDE_ENV_PREFIX)
                    .filter(|chain| !chain.is_empty() && !value.is_empty())
                    .map(|chain| (chain.to_lowercase(), value.clone()))
            })
            .collect();
        Self { rpc_overrides }
    }
}

impl EngineConfig {
    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.balance_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            chains: ChainsConfig::default(),
        })
    }

    /// 从配置文件加载配置，文件中缺省的字段取环境变量默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                let env_overrides = std::mem::take(&mut config.chains.rpc_overrides);
                config = Self::from_file(path)?;
                // 文件未覆盖的链保留环境变量中的 RPC
                for (chain, url) in env_overrides {
                    config.chains.rpc_overrides.entry(chain).or_insert(url);
                }
            }
        }

        Ok(config)
    }

    /// 按 `CHAINVAULT_CONFIG` 指定的路径加载
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::from_env_and_file(path)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.engine.balance_timeout_ms == 0 {
            anyhow::bail!("BALANCE_TIMEOUT_MS must be greater than 0");
        }
        if self.engine.rpc_timeout_ms == 0 {
            anyhow::bail!("RPC_TIMEOUT_MS must be greater than 0");
        }
        if self.engine.confirmation_poll_interval_ms == 0 {
            anyhow::bail!("CONFIRM_POLL_INTERVAL_MS must be greater than 0");
        }
        if ![12, 24].contains(&self.engine.mnemonic_words) {
            anyhow::bail!("WALLET_MNEMONIC_WORDS must be 12 or 24");
        }

        if self.store.backend != "file" && self.store.backend != "memory" {
            anyhow::bail!("WALLET_STORE_BACKEND must be 'file' or 'memory'");
        }
        if self.store.backend == "file" && self.store.path.trim().is_empty() {
            anyhow::bail!("WALLET_STORE_PATH must not be empty");
        }

        for (chain, url) in &self.chains.rpc_overrides {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("RPC override for {} must be an http(s) URL", chain);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[engine]
balance_timeout_ms = 1500
price_feed_enabled = false

[store]
backend = "memory"

[chains.rpc_overrides]
ethereum = "http://localhost:8545"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.engine.balance_timeout(), Duration::from_millis(1500));
        assert!(!config.engine.price_feed_enabled);
        assert_eq!(config.store.backend, "memory");
        assert_eq!(
            config.chains.rpc_overrides.get("ethereum").map(String::as_str),
            Some("http://localhost:8545")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_env() {
        let config = Config::from_env_and_file(Some("/nonexistent/chainvault.toml")).unwrap();
        assert!(config.engine.balance_timeout_ms > 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.logging.level = "info".into();
        config.logging.format = "text".into();
        config.store.backend = "memory".into();
        config.engine.mnemonic_words = 12;
        config.engine.balance_timeout_ms = 5000;
        config.engine.rpc_timeout_ms = 5000;
        config.engine.confirmation_poll_interval_ms = 1000;
        config.chains.rpc_overrides.clear();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.engine.balance_timeout_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.logging.format = "xml".into();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.engine.mnemonic_words = 18;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.chains
            .rpc_overrides
            .insert("ethereum".into(), "ftp://x".into());
        assert!(bad.validate().is_err());
    }
}
