//! AES-256-GCM 加密/解密模块
//! 用于助记词加密存储，密文末尾附带 16 字节认证标签

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, WalletError};

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }
}

/// 生成随机 IV
pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// 加密数据
///
/// # Returns
/// 返回 ciphertext || tag
pub fn encrypt_data(
    data: &[u8],
    key: &EncryptionKey,
    nonce: &[u8; NONCE_LENGTH],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::Storage(format!("invalid key: {}", e)))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), data)
        .map_err(|e| WalletError::Storage(format!("encryption failed: {}", e)))
}

/// 解密数据
///
/// 密钥错误与密文篡改统一返回 `Decryption`
pub fn decrypt_data(
    encrypted: &[u8],
    key: &EncryptionKey,
    nonce: &[u8; NONCE_LENGTH],
) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.len() < TAG_LENGTH {
        return Err(WalletError::Decryption);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| WalletError::Decryption)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), encrypted)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::new(*b"01234567890123456789012345678901");
        let nonce = generate_nonce();
        let data = b"Hello, World!";

        let encrypted = encrypt_data(data, &key, &nonce).unwrap();
        assert_eq!(encrypted.len(), data.len() + TAG_LENGTH);
        assert_ne!(&encrypted[..data.len()], data);

        let decrypted = decrypt_data(&encrypted, &key, &nonce).unwrap();
        assert_eq!(decrypted.as_slice(), data);
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let key = EncryptionKey::new([7u8; KEY_LENGTH]);
        let nonce = generate_nonce();
        let mut encrypted = encrypt_data(b"secret", &key, &nonce).unwrap();
        encrypted[0] ^= 0x01;

        assert!(matches!(
            decrypt_data(&encrypted, &key, &nonce),
            Err(WalletError::Decryption)
        ));
        assert!(matches!(
            decrypt_data(&[0u8; 4], &key, &nonce),
            Err(WalletError::Decryption)
        ));
    }
}
