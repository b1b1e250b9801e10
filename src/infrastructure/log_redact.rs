//! 日志脱敏
//! 地址、原始交易只以截断形式出现在日志中；助记词、种子、私钥从不记录

use serde::Serialize;

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return "*".repeat(address.chars().count());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 已签名交易脱敏
#[derive(Debug, Serialize)]
pub struct RedactedSignedTransaction {
    pub chain: String,
    pub tx_hash: String,
    pub raw: String, // 只显示前后10个字符
}

impl SensitiveRedact for crate::service::transaction_builder::SignedTransaction {
    fn redact(&self) -> String {
        serde_json::to_string(&RedactedSignedTransaction {
            chain: self.chain.clone(),
            tx_hash: self.tx_hash.clone(),
            raw: redact_hex_string(&self.raw, 10),
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}
