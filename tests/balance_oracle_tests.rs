//! 多链余额查询：并发、超时降级、价格源失败

mod common;

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use chainvault::{error::WalletError, service::balance_oracle::BalanceResult};
use common::{
    build_state, FixedPriceFeed, ScriptedTransport, ABANDON, ABANDON_EVM_ADDRESS,
    ABANDON_SOLANA_ADDRESS,
};
use serde_json::json;

#[tokio::test]
async fn test_three_chains_one_timing_out() {
    let transport = ScriptedTransport::new();
    transport
        .respond("ethereum", "eth_getBalance", json!("0xde0b6b3a7640000"))
        .respond(
            "solana",
            "getBalance",
            json!({ "context": { "slot": 1 }, "value": 2_500_000_000u64 }),
        )
        .respond("base", "eth_getBalance", json!("0x1"))
        .delay("base", Duration::from_secs(5));
    let prices = FixedPriceFeed::new(&[("ethereum", 2000), ("solana", 100)]);
    let state = build_state(transport, Some(prices));

    let mut addresses = BTreeMap::new();
    addresses.insert("ethereum".to_string(), ABANDON_EVM_ADDRESS.to_string());
    addresses.insert("base".to_string(), ABANDON_EVM_ADDRESS.to_string());
    addresses.insert("solana".to_string(), ABANDON_SOLANA_ADDRESS.to_string());

    let start = Instant::now();
    let balances = state.engine.get_balances_for(&addresses).await;
    assert!(start.elapsed() < Duration::from_secs(2));

    assert_eq!(balances.len(), 3);
    assert_eq!(
        balances["ethereum"],
        BalanceResult {
            balance: "1.000000".into(),
            usd: 2000.0,
            symbol: "ETH".into(),
        }
    );
    assert_eq!(balances["solana"].balance, "2.500000");
    assert!((balances["solana"].usd - 250.0).abs() < 1e-9);

    // 超时的链降级为零余额，符号保留
    assert_eq!(balances["base"], BalanceResult::zeroed("ETH"));
}

#[tokio::test]
async fn test_rpc_failure_degrades_to_zero() {
    let transport = ScriptedTransport::new();
    transport.fail("ethereum", "eth_getBalance", "connection refused");
    let state = build_state(transport, None);

    let result = state
        .engine
        .get_balance("ethereum", ABANDON_EVM_ADDRESS)
        .await
        .unwrap();
    assert!(result.is_zero());
    assert_eq!(result.symbol, "ETH");
}

#[tokio::test]
async fn test_price_failure_keeps_balance() {
    let transport = ScriptedTransport::new();
    transport.respond("solana", "getBalance", json!({ "value": 1_000_000_000u64 }));
    // 价格源里没有 solana 报价
    let state = build_state(transport, Some(FixedPriceFeed::new(&[("ethereum", 2000)])));

    let result = state
        .engine
        .get_balance("solana", ABANDON_SOLANA_ADDRESS)
        .await
        .unwrap();
    assert_eq!(result.balance, "1.000000");
    assert_eq!(result.usd, 0.0);
    assert_eq!(result.symbol, "SOL");
}

#[tokio::test]
async fn test_unknown_chain_is_an_error_but_skipped_in_fan_out() {
    let transport = ScriptedTransport::new();
    transport.respond("ethereum", "eth_getBalance", json!("0x0"));
    let state = build_state(transport, None);

    let err = state.engine.get_balance("dogecoin", "D123").await.unwrap_err();
    assert!(matches!(err, WalletError::UnsupportedChain(_)));

    let mut addresses = BTreeMap::new();
    addresses.insert("ethereum".to_string(), ABANDON_EVM_ADDRESS.to_string());
    addresses.insert("dogecoin".to_string(), "D123".to_string());
    let balances = state.engine.get_balances_for(&addresses).await;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances["ethereum"].balance, "0.000000");
}

#[tokio::test]
async fn test_wallet_balances_cover_every_chain() {
    let transport = ScriptedTransport::new();
    transport
        .respond("ethereum", "eth_getBalance", json!("0x0"))
        .respond("base", "eth_getBalance", json!("0x0"))
        .respond("solana", "getBalance", json!({ "value": 0 }));
    let state = build_state(transport, None);

    let stored = state.engine.import_wallet(ABANDON, "pw").unwrap();
    let balances = state.engine.get_wallet_balances(&stored).await;
    assert_eq!(balances.len(), state.engine.supported_chains().len());
    assert_eq!(
        balances.keys().cloned().collect::<Vec<_>>(),
        vec!["base", "darkwave", "ethereum", "solana"]
    );
    assert!(balances.values().all(BalanceResult::is_zero));
    assert_eq!(balances["darkwave"].symbol, "DWT");
}
