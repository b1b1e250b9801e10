pub mod balance_oracle; // 多链余额（超时降级）
pub mod blockchain_client;
pub mod native_ledger; // 原生链账本
pub mod price_service;
pub mod transaction_builder;
pub mod transaction_dispatcher;
pub mod wallets;
