//! BIP-39 助记词服务
//!
//! 助记词与种子都是拥有所有权的缓冲区，drop 时清零，Debug 输出脱敏

use std::fmt;

use bip39::Language;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

/// 助记词长度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordCount {
    #[default]
    Twelve,
    TwentyFour,
}

impl WordCount {
    /// 熵长度（字节）
    pub fn entropy_len(self) -> usize {
        match self {
            WordCount::Twelve => 16,
            WordCount::TwentyFour => 32,
        }
    }

    pub fn words(self) -> usize {
        match self {
            WordCount::Twelve => 12,
            WordCount::TwentyFour => 24,
        }
    }
}

impl TryFrom<usize> for WordCount {
    type Error = WalletError;

    fn try_from(words: usize) -> Result<Self> {
        match words {
            12 => Ok(WordCount::Twelve),
            24 => Ok(WordCount::TwentyFour),
            _ => Err(WalletError::InvalidMnemonic),
        }
    }
}

/// 已校验的助记词
#[derive(Clone)]
pub struct Mnemonic {
    phrase: Zeroizing<String>,
}

impl Mnemonic {
    /// 解析并校验助记词（词数、词表、校验和）
    pub fn parse(phrase: &str) -> Result<Self> {
        let normalized = Zeroizing::new(normalize(phrase));
        let parsed = bip39::Mnemonic::parse_in(Language::English, normalized.as_str())
            .map_err(|_| WalletError::InvalidMnemonic)?;
        WordCount::try_from(parsed.word_count())?;

        Ok(Self { phrase: normalized })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// 展开为 64 字节种子 (PBKDF2-HMAC-SHA512, 2048 轮)
    pub fn to_seed(&self, passphrase: &str) -> Result<Seed> {
        let parsed = bip39::Mnemonic::parse_in(Language::English, self.phrase.as_str())
            .map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(Seed::new(parsed.to_seed(passphrase)))
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic([REDACTED; {} words])", self.word_count())
    }
}

impl PartialEq for Mnemonic {
    fn eq(&self, other: &Self) -> bool {
        self.phrase.as_str() == other.phrase.as_str()
    }
}

impl Eq for Mnemonic {}

/// BIP-39 种子
pub struct Seed {
    bytes: Zeroizing<[u8; 64]>,
}

impl Seed {
    pub fn new(bytes: [u8; 64]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// 助记词服务
#[derive(Debug, Clone, Copy, Default)]
pub struct MnemonicService;

impl MnemonicService {
    pub fn new() -> Self {
        Self
    }

    /// 从操作系统 CSPRNG 生成新助记词
    pub fn generate(&self, words: WordCount) -> Result<Mnemonic> {
        let mut entropy = Zeroizing::new(vec![0u8; words.entropy_len()]);
        OsRng.fill_bytes(&mut entropy);

        let mnemonic = bip39::Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|_| WalletError::InvalidMnemonic)?;

        Ok(Mnemonic {
            phrase: Zeroizing::new(mnemonic.to_string()),
        })
    }

    /// 校验助记词
    pub fn validate(&self, phrase: &str) -> bool {
        Mnemonic::parse(phrase).is_ok()
    }

    /// 解析助记词并展开为种子
    pub fn to_seed(&self, phrase: &str, passphrase: &str) -> Result<Seed> {
        Mnemonic::parse(phrase)?.to_seed(passphrase)
    }
}

/// 去除首尾空白、合并连续空白、转小写
fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_word_counts() {
        let service = MnemonicService::new();

        let m12 = service.generate(WordCount::Twelve).unwrap();
        assert_eq!(m12.word_count(), 12);
        assert!(service.validate(m12.phrase()));

        let m24 = service.generate(WordCount::TwentyFour).unwrap();
        assert_eq!(m24.word_count(), 24);
        assert!(service.validate(m24.phrase()));

        assert_ne!(m12.phrase(), service.generate(WordCount::Twelve).unwrap().phrase());
    }

    #[test]
    fn test_validate_rejects_bad_phrases() {
        let service = MnemonicService::new();

        assert!(service.validate(ABANDON));
        // 校验和错误
        assert!(!service.validate(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
        ));
        // 词表外单词
        assert!(!service.validate(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon zzzz"
        ));
        // 词数错误
        assert!(!service.validate("abandon about"));
        assert!(!service.validate(""));
    }

    #[test]
    fn test_normalization() {
        let messy = format!("  {}  ", ABANDON.to_uppercase().replace(' ', "   "));
        let parsed = Mnemonic::parse(&messy).unwrap();
        assert_eq!(parsed.phrase(), ABANDON);
    }

    #[test]
    fn test_seed_vector() {
        let seed = MnemonicService::new().to_seed(ABANDON, "").unwrap();
        assert_eq!(
            hex::encode(&seed.as_bytes()[..8]),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1"[..16]
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let parsed = Mnemonic::parse(ABANDON).unwrap();
        let rendered = format!("{:?}", parsed);
        assert!(!rendered.contains("abandon"));
        assert!(rendered.contains("REDACTED"));

        let seed = parsed.to_seed("").unwrap();
        assert_eq!(format!("{:?}", seed), "Seed([REDACTED])");
    }
}
