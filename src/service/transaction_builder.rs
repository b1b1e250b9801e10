//! 交易构建与签名
//!
//! - EVM：legacy EIP-155 转账，RLP 编码，secp256k1 可恢复签名
//! - Solana：legacy 消息 + System Program 转账指令，ed25519 签名
//!
//! 签名后都会用公钥自校验一次，失败返回 `WalletError::Signature`

use base64::Engine;
use ed25519_dalek::Signer;
use k256::ecdsa::VerifyingKey;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

use crate::{
    domain::{chain_config::ChainConfig, derivation::DerivedKey},
    error::{Result, WalletError},
};

/// 普通转账的 gas limit
pub const EVM_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// 单签名交易的基础费用（lamports）
pub const SOLANA_FEE_LAMPORTS: u64 = 5_000;

const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];
const SYSTEM_TRANSFER_INSTRUCTION: u32 = 2;

/// EVM 转账参数
#[derive(Debug, Clone)]
pub struct EvmTransfer {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
}

/// Solana 转账参数，付款方由签名密钥决定
#[derive(Debug, Clone)]
pub struct SolanaTransfer {
    pub to: [u8; 32],
    pub lamports: u64,
    pub recent_blockhash: [u8; 32],
}

/// 已签名交易
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub chain: String,
    /// EVM 为 keccak 哈希，Solana 为 base58 签名
    pub tx_hash: String,
    /// `0x` 十六进制（EVM）或 base64（Solana）
    pub raw: String,
    pub payload: Vec<u8>,
}

/// 统一交易构建器
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 构建并签名 EVM 转账
    pub fn sign_evm_transfer(
        &self,
        chain: &ChainConfig,
        key: &DerivedKey,
        tx: &EvmTransfer,
    ) -> Result<SignedTransaction> {
        let DerivedKey::Secp256k1(signing_key) = key else {
            return Err(WalletError::UnsupportedCurve(format!(
                "{} requires a secp256k1 key, got {}",
                chain.id,
                key.curve()
            )));
        };
        let chain_id = chain
            .evm_chain_id
            .ok_or_else(|| WalletError::UnsupportedChain(format!("{} is not an EVM chain", chain.id)))?;

        // 签名载荷: [nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
        let mut unsigned = RlpStream::new_list(9);
        append_fields(&mut unsigned, tx);
        unsigned.append(&chain_id);
        unsigned.append(&0u8);
        unsigned.append(&0u8);
        let sighash: [u8; 32] = Keccak256::digest(unsigned.out()).into();

        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| WalletError::Signature(e.to_string()))?;

        let recovered = VerifyingKey::recover_from_prehash(&sighash, &signature, recovery_id)
            .map_err(|e| WalletError::Signature(e.to_string()))?;
        if &recovered != signing_key.verifying_key() {
            return Err(WalletError::Signature(
                "recovered key does not match signer".to_string(),
            ));
        }

        let v = chain_id * 2 + 35 + u64::from(recovery_id.is_y_odd());
        let signature_bytes = signature.to_bytes();
        let (r, s) = signature_bytes.split_at(32);

        let mut signed = RlpStream::new_list(9);
        append_fields(&mut signed, tx);
        signed.append(&v);
        signed.append(&trim_leading_zeros(r));
        signed.append(&trim_leading_zeros(s));
        let payload = signed.out().to_vec();

        Ok(SignedTransaction {
            chain: chain.id.clone(),
            tx_hash: format!("0x{}", hex::encode(Keccak256::digest(&payload))),
            raw: format!("0x{}", hex::encode(&payload)),
            payload,
        })
    }

    /// 构建并签名 Solana 转账
    pub fn sign_solana_transfer(
        &self,
        chain: &ChainConfig,
        key: &DerivedKey,
        tx: &SolanaTransfer,
    ) -> Result<SignedTransaction> {
        let DerivedKey::Ed25519(signing_key) = key else {
            return Err(WalletError::UnsupportedCurve(format!(
                "{} requires an ed25519 key, got {}",
                chain.id,
                key.curve()
            )));
        };

        let from = signing_key.verifying_key().to_bytes();
        let message = encode_transfer_message(&from, tx);

        let signature = signing_key.sign(&message);
        signing_key
            .verifying_key()
            .verify_strict(&message, &signature)
            .map_err(|e| WalletError::Signature(e.to_string()))?;
        let signature = signature.to_bytes();

        let mut payload = encode_compact_u16(1);
        payload.extend_from_slice(&signature);
        payload.extend_from_slice(&message);

        Ok(SignedTransaction {
            chain: chain.id.clone(),
            tx_hash: bs58::encode(signature).into_string(),
            raw: base64::engine::general_purpose::STANDARD.encode(&payload),
            payload,
        })
    }
}

fn append_fields(stream: &mut RlpStream, tx: &EvmTransfer) {
    stream.append(&tx.nonce);
    stream.append(&tx.gas_price);
    stream.append(&tx.gas_limit);
    stream.append(&tx.to.to_vec());
    stream.append(&tx.value);
    stream.append(&Vec::<u8>::new());
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Solana legacy 消息：单签名付款方 + System Program 转账指令
pub fn encode_transfer_message(from: &[u8; 32], tx: &SolanaTransfer) -> Vec<u8> {
    let self_transfer = from == &tx.to;

    // 账户顺序: 可写签名者, 可写非签名者, 只读非签名者
    let mut account_keys: Vec<&[u8; 32]> = vec![from];
    if !self_transfer {
        account_keys.push(&tx.to);
    }
    account_keys.push(&SYSTEM_PROGRAM_ID);

    let program_index = (account_keys.len() - 1) as u8;
    let to_index = if self_transfer { 0u8 } else { 1u8 };

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INSTRUCTION.to_le_bytes());
    data.extend_from_slice(&tx.lamports.to_le_bytes());

    let mut message = vec![1u8, 0, 1];
    message.extend(encode_compact_u16(account_keys.len() as u16));
    for key in &account_keys {
        message.extend_from_slice(&key[..]);
    }
    message.extend_from_slice(&tx.recent_blockhash);

    message.extend(encode_compact_u16(1));
    message.push(program_index);
    message.extend(encode_compact_u16(2));
    message.extend_from_slice(&[0, to_index]);
    message.extend(encode_compact_u16(data.len() as u16));
    message.extend_from_slice(&data);
    message
}

/// compact-u16 (shortvec) 编码
pub fn encode_compact_u16(mut value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        byte |= 0x80;
        out.push(byte);
    }
}
