use std::sync::Arc;

use crate::{
    config::Config,
    domain::{
        chain_config::ChainRegistry, mnemonic::WordCount,
        multi_chain_wallet::MultiChainWalletService,
    },
    infrastructure::{
        upstream::{HttpRpcTransport, RpcTransport},
        wallet_store::{FileWalletStore, InMemoryWalletStore, WalletStore},
    },
    service::{
        balance_oracle::BalanceOracle,
        blockchain_client::BlockchainClient,
        native_ledger::InMemoryLedger,
        price_service::{CoinGeckoPriceFeed, PriceFeed},
        transaction_dispatcher::{ConfirmationPolicy, TransactionDispatcher},
        wallets::WalletEngine,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 链配置表（注入的不可变值）
    pub registry: Arc<ChainRegistry>,
    pub blockchain_client: Arc<BlockchainClient>,
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<dyn WalletStore>,
    pub engine: Arc<WalletEngine>,
}

impl AppState {
    /// 按配置创建应用状态（真实 HTTP 传输、CoinGecko 价格源）
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let registry =
            Arc::new(ChainRegistry::new().with_rpc_overrides(&config.chains.rpc_overrides));
        if let Err(problems) = registry.validate_configs() {
            anyhow::bail!("invalid chain table: {}", problems.join("; "));
        }

        let transport: Arc<dyn RpcTransport> = Arc::new(HttpRpcTransport::new(
            config.engine.rpc_timeout(),
            config.engine.rpc_retries,
        )?);

        let price_feed: Option<Arc<dyn PriceFeed>> = if config.engine.price_feed_enabled {
            Some(Arc::new(CoinGeckoPriceFeed::new(
                config.engine.price_feed_url.clone(),
                config.engine.price_cache_ttl(),
                config.engine.rpc_timeout(),
            )?))
        } else {
            tracing::info!("price feed disabled, usd values will be zero");
            None
        };

        let store: Arc<dyn WalletStore> = match config.store.backend.as_str() {
            "memory" => Arc::new(InMemoryWalletStore::new()),
            _ => Arc::new(FileWalletStore::open(&config.store.path)?),
        };

        Self::assemble(config, registry, transport, price_feed, store)
    }

    /// 用给定的传输层、价格源和存储组装各服务
    pub fn assemble(
        config: Arc<Config>,
        registry: Arc<ChainRegistry>,
        transport: Arc<dyn RpcTransport>,
        price_feed: Option<Arc<dyn PriceFeed>>,
        store: Arc<dyn WalletStore>,
    ) -> anyhow::Result<Self> {
        let words = WordCount::try_from(config.engine.mnemonic_words)?;

        let native = registry.list().iter().find(|c| c.is_native);
        let ledger = Arc::new(InMemoryLedger::new(
            native.map(|c| c.id.as_str()).unwrap_or("native"),
            native.map(|c| c.decimals).unwrap_or(18),
        ));

        let blockchain_client = Arc::new(BlockchainClient::new(transport));
        let wallets = MultiChainWalletService::new(registry.clone());

        let mut balances = BalanceOracle::new(
            registry.clone(),
            blockchain_client.clone(),
            ledger.clone(),
            config.engine.balance_timeout(),
        );
        if let Some(feed) = price_feed {
            balances = balances.with_price_feed(feed);
        }

        let dispatcher = TransactionDispatcher::new(
            wallets.derivation().clone(),
            blockchain_client.clone(),
            ConfirmationPolicy {
                poll_interval: config.engine.confirmation_poll_interval(),
                max_attempts: config.engine.confirmation_max_attempts,
            },
        );

        let engine = Arc::new(
            WalletEngine::new(wallets, balances, dispatcher, ledger.clone(), store.clone())
                .with_word_count(words),
        );
        tracing::info!(chains = registry.len(), "wallet engine initialized");

        Ok(Self {
            config,
            registry,
            blockchain_client,
            ledger,
            store,
            engine,
        })
    }
}
