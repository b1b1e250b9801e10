//! 交易派发集成测试：EVM / Solana 转账、预检、广播失败、确认轮询

mod common;

use base64::Engine;
use chainvault::{
    app_state::AppState,
    domain::mnemonic::Mnemonic,
    error::WalletError,
};
use common::{
    build_state, ScriptedTransport, ABANDON, ABANDON_EVM_ADDRESS, ABANDON_SOLANA_ADDRESS,
};
use serde_json::json;

const EVM_RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

fn node_hash() -> String {
    format!("0x{}", "11".repeat(32))
}

fn setup(transport: std::sync::Arc<ScriptedTransport>) -> (AppState, Mnemonic) {
    let state = build_state(transport, None);
    (state, Mnemonic::parse(ABANDON).unwrap())
}

fn script_evm_preflight(transport: &ScriptedTransport, balance: &str) {
    transport
        .respond("ethereum", "eth_getBalance", json!(balance))
        .respond("ethereum", "eth_gasPrice", json!("0x3b9aca00"))
        .respond("ethereum", "eth_getTransactionCount", json!("0x5"));
}

#[tokio::test]
async fn test_evm_transfer_is_signed_broadcast_and_confirmed() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0x8ac7230489e80000"); // 10 ETH
    transport
        .respond("ethereum", "eth_sendRawTransaction", json!(node_hash()))
        .respond("ethereum", "eth_getTransactionReceipt", json!(null))
        .respond(
            "ethereum",
            "eth_getTransactionReceipt",
            json!({ "status": "0x1", "blockNumber": "0x10" }),
        );
    let (state, mnemonic) = setup(transport.clone());

    let result = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "1")
        .await
        .unwrap();
    assert_eq!(result.tx_hash, node_hash());
    assert_eq!(
        result.explorer_url,
        format!("https://etherscan.io/tx/{}", node_hash())
    );

    // 按待定 nonce 签名
    let nonce_calls = transport.calls_for("eth_getTransactionCount");
    assert_eq!(nonce_calls[0].1, json!([ABANDON_EVM_ADDRESS, "pending"]));

    let sent = transport.calls_for("eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    let raw = sent[0].1[0].as_str().unwrap();
    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    let tx = rlp::Rlp::new(&bytes);
    assert_eq!(tx.item_count().unwrap(), 9);
    assert_eq!(tx.val_at::<u64>(0).unwrap(), 5);
    assert_eq!(tx.val_at::<u64>(1).unwrap(), 1_000_000_000);
    assert_eq!(tx.val_at::<u64>(2).unwrap(), 21_000);
    assert_eq!(
        tx.val_at::<Vec<u8>>(3).unwrap(),
        hex::decode("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap()
    );
    assert_eq!(tx.val_at::<u64>(4).unwrap(), 1_000_000_000_000_000_000);
    let v = tx.val_at::<u64>(6).unwrap();
    assert!(v == 37 || v == 38, "unexpected v {}", v);

    assert_eq!(transport.calls_for("eth_getTransactionReceipt").len(), 2);
}

#[tokio::test]
async fn test_evm_insufficient_funds_never_broadcasts() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0xde0b6b3a7640000"); // 1 ETH
    let (state, mnemonic) = setup(transport.clone());

    // 1 ETH + gas 超出余额
    let err = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "1")
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds {
            chain, available, ..
        } => {
            assert_eq!(chain, "ethereum");
            assert_eq!(available, "1");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(transport.calls_for("eth_sendRawTransaction").is_empty());
}

#[tokio::test]
async fn test_evm_reverted_transaction_fails() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0x8ac7230489e80000");
    transport
        .respond("ethereum", "eth_sendRawTransaction", json!(node_hash()))
        .respond(
            "ethereum",
            "eth_getTransactionReceipt",
            json!({ "status": "0x0", "blockNumber": "0x10" }),
        );
    let (state, mnemonic) = setup(transport);

    let err = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "0.1")
        .await
        .unwrap_err();
    assert!(
        matches!(err, WalletError::TransactionFailed { ref tx_hash, .. } if *tx_hash == node_hash())
    );
}

#[tokio::test]
async fn test_broadcast_failure_is_not_retried() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0x8ac7230489e80000");
    transport.fail("ethereum", "eth_sendRawTransaction", "connection reset");
    let (state, mnemonic) = setup(transport.clone());

    let err = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::ProviderUnavailable { .. }));
    assert!(err.is_retryable());
    assert_eq!(transport.calls_for("eth_sendRawTransaction").len(), 1);
    assert!(transport.calls_for("eth_getTransactionReceipt").is_empty());
}

#[tokio::test]
async fn test_cancel_before_broadcast_sends_nothing() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0x8ac7230489e80000");
    transport
        .respond("ethereum", "eth_sendRawTransaction", json!(node_hash()))
        .respond(
            "ethereum",
            "eth_getTransactionReceipt",
            json!({ "status": "0x1", "blockNumber": "0x10" }),
        )
        .delay("ethereum", std::time::Duration::from_millis(100));
    let (state, mnemonic) = setup(transport.clone());

    // 预检还没返回就被丢弃
    let cancelled = tokio::time::timeout(
        std::time::Duration::from_millis(30),
        state
            .engine
            .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "0.1"),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(transport.calls_for("eth_sendRawTransaction").is_empty());

    // 账户锁随之释放
    let result = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "0.1")
        .await
        .unwrap();
    assert_eq!(result.tx_hash, node_hash());
    assert_eq!(transport.calls_for("eth_sendRawTransaction").len(), 1);
}

#[tokio::test]
async fn test_missing_receipt_still_returns_hash() {
    let transport = ScriptedTransport::new();
    script_evm_preflight(&transport, "0x8ac7230489e80000");
    transport
        .respond("ethereum", "eth_sendRawTransaction", json!(node_hash()))
        .respond("ethereum", "eth_getTransactionReceipt", json!(null));
    let (state, mnemonic) = setup(transport.clone());

    let result = state
        .engine
        .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, "0.1")
        .await
        .unwrap();
    assert_eq!(result.tx_hash, node_hash());
    // 轮询次数受配置限制
    assert_eq!(transport.calls_for("eth_getTransactionReceipt").len(), 3);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_rpc() {
    let transport = ScriptedTransport::new();
    let (state, mnemonic) = setup(transport.clone());

    let err = state
        .engine
        .send_transaction("ethereum", &mnemonic, "0x1234", "1")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidAddress { .. }));

    // 大小写混合但校验和错误
    let err = state
        .engine
        .send_transaction(
            "ethereum",
            &mnemonic,
            "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "1",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidAddress { .. }));

    for amount in ["0", "-1", "abc"] {
        let err = state
            .engine
            .send_transaction("ethereum", &mnemonic, EVM_RECIPIENT, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)), "{}", amount);
    }

    let err = state
        .engine
        .send_transaction("dogecoin", &mnemonic, EVM_RECIPIENT, "1")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::UnsupportedChain(_)));

    assert_eq!(transport.call_count(), 0);
}

fn script_solana(transport: &ScriptedTransport, lamports: u64) {
    transport
        .respond("solana", "getBalance", json!({ "value": lamports }))
        .respond(
            "solana",
            "getLatestBlockhash",
            json!({ "value": { "blockhash": bs58::encode([9u8; 32]).into_string(), "lastValidBlockHeight": 100 } }),
        );
}

#[tokio::test]
async fn test_solana_transfer_is_signed_broadcast_and_confirmed() {
    let transport = ScriptedTransport::new();
    script_solana(&transport, 2_000_000_000);
    let signature = bs58::encode([3u8; 64]).into_string();
    transport
        .respond("solana", "sendTransaction", json!(signature))
        .respond("solana", "getSignatureStatuses", json!({ "value": [null] }))
        .respond(
            "solana",
            "getSignatureStatuses",
            json!({ "value": [{ "err": null, "confirmationStatus": "confirmed" }] }),
        );
    let (state, mnemonic) = setup(transport.clone());
    let recipient = bs58::encode([7u8; 32]).into_string();

    let result = state
        .engine
        .send_transaction("solana", &mnemonic, &recipient, "0.5")
        .await
        .unwrap();
    assert_eq!(result.tx_hash, signature);
    assert_eq!(result.explorer_url, format!("https://solscan.io/tx/{}", signature));

    assert_eq!(
        transport.calls_for("getBalance")[0].1,
        json!([ABANDON_SOLANA_ADDRESS])
    );

    let sent = transport.calls_for("sendTransaction");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1[1]["encoding"], "base64");
    let payload = base64::engine::general_purpose::STANDARD
        .decode(sent[0].1[0].as_str().unwrap())
        .unwrap();
    assert_eq!(payload.len(), 1 + 64 + 150);

    let message = &payload[65..];
    let from = bs58::decode(ABANDON_SOLANA_ADDRESS).into_vec().unwrap();
    assert_eq!(&message[4..36], &from[..]);
    assert_eq!(&message[36..68], &[7u8; 32]);
    assert_eq!(&message[100..132], &[9u8; 32]);
    assert_eq!(&message[142..150], &500_000_000u64.to_le_bytes());
}

#[tokio::test]
async fn test_solana_fee_reserve_is_checked() {
    let transport = ScriptedTransport::new();
    script_solana(&transport, 1_000_000_000);
    let (state, mnemonic) = setup(transport.clone());
    let recipient = bs58::encode([7u8; 32]).into_string();

    // 正好 1 SOL 不够支付 5000 lamports 手续费
    let err = state
        .engine
        .send_transaction("solana", &mnemonic, &recipient, "1")
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds { required, .. } => assert_eq!(required, "1.000005"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(transport.calls_for("sendTransaction").is_empty());
}

#[tokio::test]
async fn test_solana_on_chain_error_fails() {
    let transport = ScriptedTransport::new();
    script_solana(&transport, 2_000_000_000);
    transport
        .respond("solana", "sendTransaction", json!("sig"))
        .respond(
            "solana",
            "getSignatureStatuses",
            json!({ "value": [{ "err": { "InstructionError": [0, "Custom"] }, "confirmationStatus": "processed" }] }),
        );
    let (state, mnemonic) = setup(transport);
    let recipient = bs58::encode([7u8; 32]).into_string();

    let err = state
        .engine
        .send_transaction("solana", &mnemonic, &recipient, "0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::TransactionFailed { .. }));
}
