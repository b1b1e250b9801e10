//! chainvault - 多链 HD 钱包引擎
//!
//! 助记词只以加密信封的形式持久化；派生、签名都在内存中按需完成

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{Result, WalletError};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{
            ChainConfig, ChainRegistry, CurveType, Mnemonic, MultiChainWalletService, Seed,
            StoredWallet, WordCount,
        },
        error::{Result, WalletError},
        service::{
            balance_oracle::{BalanceOracle, BalanceResult},
            transaction_dispatcher::{TransactionDispatcher, TransactionResult},
            wallets::WalletEngine,
        },
    };
}
