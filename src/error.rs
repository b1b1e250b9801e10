//! 钱包引擎统一错误类型
//!
//! 助记词/密码相关错误对外只暴露一条通用提示，避免成为密码预言机

use thiserror::Error;

/// 对外统一的通用提示（密码错误与数据损坏不可区分）
pub const GENERIC_UNLOCK_MESSAGE: &str = "invalid password or corrupted wallet";

#[derive(Debug, Error)]
pub enum WalletError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 输入 / 密钥材料
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("invalid mnemonic phrase")]
    InvalidMnemonic,

    /// 密码错误或密文被篡改，二者刻意不区分
    #[error("decryption failed")]
    Decryption,

    /// AEAD 校验通过但明文不是合法助记词
    #[error("wallet envelope decrypted to an invalid mnemonic")]
    CorruptedWallet,

    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 配置 / 编程错误
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 交易
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("invalid address for {chain}: {address}")]
    InvalidAddress { chain: String, address: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds on {chain}: required {required}, available {available}")]
    InsufficientFunds {
        chain: String,
        required: String,
        available: String,
    },

    #[error("signature error: {0}")]
    Signature(String),

    #[error("transaction {tx_hash} failed on {chain}")]
    TransactionFailed { chain: String, tx_hash: String },

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 外部依赖
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    /// RPC 不可达，由调用方决定是否重试
    #[error("provider unavailable for {chain}: {reason}")]
    ProviderUnavailable { chain: String, reason: String },

    /// 节点返回了 JSON-RPC 错误
    #[error("rpc error from {chain}: {message}")]
    Rpc { chain: String, message: String },

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

impl WalletError {
    /// 稳定的错误码（snake_case），供上层映射
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidMnemonic => "invalid_mnemonic",
            WalletError::Decryption => "decryption_failed",
            WalletError::CorruptedWallet => "corrupted_wallet",
            WalletError::InvalidBackup(_) => "invalid_backup",
            WalletError::KeyDerivation(_) => "key_derivation_failed",
            WalletError::UnsupportedCurve(_) => "unsupported_curve",
            WalletError::UnsupportedChain(_) => "chain_not_supported",
            WalletError::Config(_) => "invalid_configuration",
            WalletError::InvalidAddress { .. } => "invalid_address",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::InsufficientFunds { .. } => "insufficient_balance",
            WalletError::Signature(_) => "invalid_signature",
            WalletError::TransactionFailed { .. } => "transaction_failed",
            WalletError::ProviderUnavailable { .. } => "provider_unavailable",
            WalletError::Rpc { .. } => "rpc_error",
            WalletError::WalletNotFound(_) => "wallet_not_found",
            WalletError::Storage(_) => "storage_error",
        }
    }

    /// 面向用户的提示
    pub fn user_message(&self) -> String {
        match self {
            WalletError::Decryption | WalletError::CorruptedWallet => {
                GENERIC_UNLOCK_MESSAGE.to_string()
            }
            WalletError::ProviderUnavailable { chain, .. } => {
                format!("{} network is temporarily unavailable, please retry", chain)
            }
            other => other.to_string(),
        }
    }

    /// 仅 RPC 不可达属于可重试错误；广播后的失败绝不自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::ProviderUnavailable { .. })
    }

    pub fn provider_unavailable(chain: impl Into<String>, reason: impl ToString) -> Self {
        WalletError::ProviderUnavailable {
            chain: chain.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_address(chain: impl Into<String>, address: impl Into<String>) -> Self {
        WalletError::InvalidAddress {
            chain: chain.into(),
            address: address.into(),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::InvalidBackup(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}
