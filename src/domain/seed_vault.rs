//! 助记词加密保险库
//!
//! PBKDF2-HMAC-SHA256 (100,000 次) 派生 256 位密钥，AES-256-GCM 加密助记词。
//! 每次加密使用新的随机盐值与 IV

use crate::{
    domain::mnemonic::Mnemonic,
    error::{Result, WalletError},
    infrastructure::{
        encryption::{self, NONCE_LENGTH},
        pbkdf2::{self, SALT_LENGTH},
    },
};

/// 加密信封（原始字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSeed {
    /// ciphertext || tag
    pub ciphertext: Vec<u8>,
    pub salt: [u8; SALT_LENGTH],
    pub iv: [u8; NONCE_LENGTH],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeedEncryptionVault;

impl SeedEncryptionVault {
    pub fn new() -> Self {
        Self
    }

    /// 加密助记词
    pub fn encrypt(&self, mnemonic: &Mnemonic, password: &str) -> Result<EncryptedSeed> {
        let salt = pbkdf2::generate_salt();
        let iv = encryption::generate_nonce();
        let key = pbkdf2::derive_key(password, &salt);

        let ciphertext = encryption::encrypt_data(mnemonic.phrase().as_bytes(), &key, &iv)?;

        Ok(EncryptedSeed {
            ciphertext,
            salt,
            iv,
        })
    }

    /// 解密并重新校验助记词
    ///
    /// 密码错误与密文损坏都返回 `Decryption`；
    /// 认证通过但明文不是合法助记词返回 `CorruptedWallet`
    pub fn decrypt(&self, envelope: &EncryptedSeed, password: &str) -> Result<Mnemonic> {
        let key = pbkdf2::derive_key(password, &envelope.salt);
        let plaintext = encryption::decrypt_data(&envelope.ciphertext, &key, &envelope.iv)?;

        let phrase = std::str::from_utf8(&plaintext).map_err(|_| WalletError::CorruptedWallet)?;
        Mnemonic::parse(phrase).map_err(|_| WalletError::CorruptedWallet)
    }
}
