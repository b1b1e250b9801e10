//! PBKDF2 密钥派生模块
//! 用于从用户密码派生钱包加密密钥

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::infrastructure::encryption::{EncryptionKey, KEY_LENGTH};

/// PBKDF2 密钥派生参数
pub const PBKDF2_ITERATIONS: u32 = 100_000; // 100,000次迭代
pub const SALT_LENGTH: usize = 16; // 16字节盐值

/// 生成随机盐值
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// 从密码和盐值派生 AES-256 密钥
///
/// # Arguments
/// * `password` - 用户密码
/// * `salt` - 16 字节盐值
pub fn derive_key(password: &str, salt: &[u8; SALT_LENGTH]) -> EncryptionKey {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    let derived = EncryptionKey::new(key);
    zeroize::Zeroize::zeroize(&mut key);
    derived
}
