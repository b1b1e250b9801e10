//! 地址编码与验证
//!
//! 按链配置的地址格式统一验证，EVM 地址支持 EIP-55 校验和

use sha3::{Digest, Keccak256};

use crate::domain::chain_config::{AddressFormat, ChainConfig};

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 按链的地址格式验证地址
    pub fn validate(config: &ChainConfig, address: &str) -> bool {
        match config.address_format {
            AddressFormat::Eip55Hex => parse_evm_address(address).is_some(),
            AddressFormat::SolanaBase58 => parse_solana_address(address).is_some(),
            AddressFormat::PrefixedHex => {
                parse_prefixed_address(&config.address_prefix, address).is_some()
            }
        }
    }
}

/// 公钥哈希 → EIP-55 校验和地址
/// https://eips.ethereum.org/EIPS/eip-55
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// 解析 EVM 地址
///
/// 全小写或全大写地址不带校验和，直接接受；大小写混合时必须满足 EIP-55
pub fn parse_evm_address(address: &str) -> Option<[u8; 20]> {
    let hex_part = address.strip_prefix("0x")?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut bytes).ok()?;

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(&bytes) != address {
        return None;
    }

    Some(bytes)
}

/// 解析 Solana 地址（32 字节公钥的 Base58）
pub fn parse_solana_address(address: &str) -> Option<[u8; 32]> {
    if address.len() < 32 || address.len() > 44 {
        return None;
    }
    let decoded = bs58::decode(address).into_vec().ok()?;
    decoded.try_into().ok()
}

/// 解析自定义前缀的十六进制地址（前缀 + 40 位小写十六进制）
pub fn parse_prefixed_address(prefix: &str, address: &str) -> Option<[u8; 20]> {
    let hex_part = address.strip_prefix(prefix)?;
    if hex_part.len() != 40
        || !hex_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return None;
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut bytes).ok()?;
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain_config::ChainRegistry;

    #[test]
    fn test_checksum_encoding() {
        // EIP-55 测试向量
        let bytes: [u8; 20] = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            to_checksum_address(&bytes),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_evm_address_validation() {
        assert!(parse_evm_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_some());
        // 全小写（无校验和）
        assert!(parse_evm_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_some());
        // 校验和错误
        assert!(parse_evm_address("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_none());
        assert!(parse_evm_address("0x123").is_none());
        assert!(parse_evm_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_none());
        assert!(parse_evm_address("0xGGGGb6053f3e94c9b9a09f33669435e7ef1beaed").is_none());
    }

    #[test]
    fn test_solana_address_validation() {
        assert!(parse_solana_address("11111111111111111111111111111111").is_some());
        assert!(parse_solana_address("HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk").is_some());
        assert!(parse_solana_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_none());
        assert!(parse_solana_address("short").is_none());
    }

    #[test]
    fn test_validate_by_chain_format() {
        let registry = ChainRegistry::new();

        let eth = registry.get("ethereum").unwrap();
        assert!(AddressValidator::validate(
            eth,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        ));

        let dw = registry.get("darkwave").unwrap();
        assert!(AddressValidator::validate(
            dw,
            "DW9858effd232b4033e47d90003d41ec34ecaeda94"
        ));
        assert!(!AddressValidator::validate(
            dw,
            "DW9858EfFD232B4033E47d90003D41EC34EcaEda94"
        ));
        assert!(!AddressValidator::validate(
            dw,
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        ));
    }
}
