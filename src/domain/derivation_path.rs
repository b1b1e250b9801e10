//! BIP32/BIP44 派生路径
//!
//! 解析 `m/44'/60'/0'/0/0` 形式的路径，硬化标记接受 `'` `h` `H`

use std::{fmt, str::FromStr};

use crate::error::WalletError;

pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 路径中的单个子索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildIndex {
    Normal(u32),
    Hardened(u32),
}

impl ChildIndex {
    /// BIP32 编码后的索引（硬化索引加上 2^31）
    pub fn to_raw(self) -> u32 {
        match self {
            ChildIndex::Normal(i) => i,
            ChildIndex::Hardened(i) => i | HARDENED_OFFSET,
        }
    }

    pub fn is_hardened(self) -> bool {
        matches!(self, ChildIndex::Hardened(_))
    }

    pub fn index(self) -> u32 {
        match self {
            ChildIndex::Normal(i) | ChildIndex::Hardened(i) => i,
        }
    }
}

impl FromStr for ChildIndex {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix(&['\'', 'h', 'H'][..]) {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        let index: u32 = digits
            .parse()
            .map_err(|_| WalletError::Config(format!("invalid path component: {}", s)))?;
        if index >= HARDENED_OFFSET {
            return Err(WalletError::Config(format!(
                "path component out of range: {}",
                s
            )));
        }

        Ok(if hardened {
            ChildIndex::Hardened(index)
        } else {
            ChildIndex::Normal(index)
        })
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildIndex::Normal(i) => write!(f, "{}", i),
            ChildIndex::Hardened(i) => write!(f, "{}'", i),
        }
    }
}

/// 解析后的派生路径
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HdPath {
    components: Vec<ChildIndex>,
}

impl HdPath {
    pub fn components(&self) -> &[ChildIndex] {
        &self.components
    }

    /// ed25519 (SLIP-0010) 只允许硬化派生
    pub fn is_fully_hardened(&self) -> bool {
        self.components.iter().all(|c| c.is_hardened())
    }

    /// BIP44 account 层（第 3 段）
    pub fn account(&self) -> Option<u32> {
        self.components.get(2).map(|c| c.index())
    }

    /// BIP44 address_index 层（第 5 段）
    pub fn address_index(&self) -> Option<u32> {
        self.components.get(4).map(|c| c.index())
    }
}

impl FromStr for HdPath {
    type Err = WalletError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let rest = path
            .trim()
            .strip_prefix("m/")
            .ok_or_else(|| WalletError::Config(format!("path must start with 'm/': {}", path)))?;

        let components = rest
            .split('/')
            .map(ChildIndex::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if components.is_empty() {
            return Err(WalletError::Config(
                "path must have at least one component".to_string(),
            ));
        }

        Ok(Self { components })
    }
}

impl fmt::Display for HdPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

/// 批量验证多链派生路径一致性
///
/// 同一助记词派生的多链账户必须使用相同的 account 和 address_index
pub fn validate_multi_chain_consistency(paths: &[(&str, &HdPath)]) -> Result<(), WalletError> {
    let Some((first_chain, first)) = paths.first() else {
        return Ok(());
    };

    for (chain, path) in paths.iter().skip(1) {
        if path.account() != first.account() {
            return Err(WalletError::Config(format!(
                "Inconsistent account index: chain {} uses {:?}, {} uses {:?}",
                chain,
                path.account(),
                first_chain,
                first.account()
            )));
        }
        // Solana 路径没有 address_index 层，只比较双方都有的情况
        if let (Some(a), Some(b)) = (path.address_index(), first.address_index()) {
            if a != b {
                return Err(WalletError::Config(format!(
                    "Inconsistent address index: chain {} uses {}, {} uses {}",
                    chain, a, first_chain, b
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethereum_path() {
        let path: HdPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert_eq!(path.components().len(), 5);
        assert_eq!(path.components()[0], ChildIndex::Hardened(44));
        assert_eq!(path.components()[3], ChildIndex::Normal(0));
        assert_eq!(path.components()[1].to_raw(), 60 | HARDENED_OFFSET);
        assert!(!path.is_fully_hardened());
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/0");
    }

    #[test]
    fn test_alternate_hardened_markers() {
        let a: HdPath = "m/44h/501H/0'/0'".parse().unwrap();
        let b: HdPath = "m/44'/501'/0'/0'".parse().unwrap();
        assert_eq!(a, b);
        assert!(a.is_fully_hardened());
    }

    #[test]
    fn test_invalid_paths() {
        assert!("44'/60'/0'/0/0".parse::<HdPath>().is_err());
        assert!("m/".parse::<HdPath>().is_err());
        assert!("m/44'/abc/0".parse::<HdPath>().is_err());
        assert!("m/2147483648".parse::<HdPath>().is_err());
    }

    #[test]
    fn test_multi_chain_consistency() {
        let eth: HdPath = "m/44'/60'/0'/0/0".parse().unwrap();
        let sol: HdPath = "m/44'/501'/0'/0'".parse().unwrap();
        let other: HdPath = "m/44'/60'/1'/0/0".parse().unwrap();

        assert!(validate_multi_chain_consistency(&[("ethereum", &eth), ("solana", &sol)]).is_ok());
        assert!(
            validate_multi_chain_consistency(&[("ethereum", &eth), ("bsc", &other)]).is_err()
        );
    }
}
