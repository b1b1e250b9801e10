//! 持久化的钱包记录
//!
//! 唯一落盘的数据结构：地址表 + 加密助记词信封。字段名与备份 JSON 保持 camelCase

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::seed_vault::EncryptedSeed,
    error::{Result, WalletError},
    infrastructure::{
        encryption::{NONCE_LENGTH, TAG_LENGTH},
        pbkdf2::SALT_LENGTH,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWallet {
    /// chainId → 地址
    pub addresses: BTreeMap<String, String>,
    /// base64(ciphertext || tag)
    pub encrypted_seed: String,
    /// base64(16 字节盐值)
    pub salt: String,
    /// base64(12 字节 IV)
    pub iv: String,
    pub created_at: DateTime<Utc>,
}

impl StoredWallet {
    pub fn new(addresses: BTreeMap<String, String>, envelope: &EncryptedSeed) -> Self {
        Self {
            addresses,
            encrypted_seed: STANDARD.encode(&envelope.ciphertext),
            salt: STANDARD.encode(envelope.salt),
            iv: STANDARD.encode(envelope.iv),
            created_at: Utc::now(),
        }
    }

    /// 替换加密信封（修改密码），地址与创建时间保持不变
    pub fn with_envelope(&self, envelope: &EncryptedSeed) -> Self {
        Self {
            addresses: self.addresses.clone(),
            encrypted_seed: STANDARD.encode(&envelope.ciphertext),
            salt: STANDARD.encode(envelope.salt),
            iv: STANDARD.encode(envelope.iv),
            created_at: self.created_at,
        }
    }

    /// 解码加密信封并校验各字段长度
    pub fn envelope(&self) -> Result<EncryptedSeed> {
        let ciphertext = decode_field("encryptedSeed", &self.encrypted_seed)?;
        if ciphertext.len() <= TAG_LENGTH {
            return Err(WalletError::InvalidBackup(
                "encryptedSeed is too short".to_string(),
            ));
        }

        let salt: [u8; SALT_LENGTH] = decode_field("salt", &self.salt)?
            .try_into()
            .map_err(|_| WalletError::InvalidBackup(format!("salt must be {} bytes", SALT_LENGTH)))?;
        let iv: [u8; NONCE_LENGTH] = decode_field("iv", &self.iv)?
            .try_into()
            .map_err(|_| WalletError::InvalidBackup(format!("iv must be {} bytes", NONCE_LENGTH)))?;

        Ok(EncryptedSeed {
            ciphertext,
            salt,
            iv,
        })
    }

    pub fn address(&self, chain_id: &str) -> Option<&str> {
        self.addresses.get(chain_id).map(String::as_str)
    }

    /// 导出为格式化 JSON 备份
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(WalletError::from)
    }

    /// 从 JSON 备份导入，缺字段或信封格式错误返回 `InvalidBackup`
    pub fn from_backup_json(json: &str) -> Result<Self> {
        let wallet: StoredWallet = serde_json::from_str(json)?;
        wallet.envelope()?;
        Ok(wallet)
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    if value.is_empty() {
        return Err(WalletError::InvalidBackup(format!("{} is empty", name)));
    }
    STANDARD
        .decode(value)
        .map_err(|e| WalletError::InvalidBackup(format!("{} is not valid base64: {}", name, e)))
}
