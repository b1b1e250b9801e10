//! Domain 模块
//!
//! 包含核心业务逻辑和领域模型

pub mod chain_config;
pub mod derivation;
pub mod derivation_path;
pub mod mnemonic;
pub mod multi_chain_wallet;
pub mod seed_vault;
pub mod stored_wallet;

// 重新导出常用类型
pub use chain_config::{AddressFormat, ChainConfig, ChainRegistry, CurveType};
pub use derivation::{
    AddressDerivationEngine, DerivationStrategy, DerivationStrategyFactory, DerivedAccount,
    DerivedKey,
};
pub use derivation_path::HdPath;
pub use mnemonic::{Mnemonic, MnemonicService, Seed, WordCount};
pub use multi_chain_wallet::{CreatedWallet, MultiChainWalletService};
pub use seed_vault::{EncryptedSeed, SeedEncryptionVault};
pub use stored_wallet::StoredWallet;
