use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, WalletError};

const PRICE_SOURCE: &str = "coingecko";

/// 价格数据结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub price_id: String,
    pub price_usd: Decimal,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

/// 法币价格源
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// 按价格源 id 查询 USD 价格
    async fn usd_price(&self, price_id: &str) -> Result<Decimal>;
}

/// CoinGecko API 响应
#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    #[serde(flatten)]
    prices: HashMap<String, CoinGeckoCoin>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoCoin {
    usd: f64,
}

/// CoinGecko 价格服务（内存 TTL 缓存）
pub struct CoinGeckoPriceFeed {
    base_url: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, Price>>,
    client: reqwest::Client,
}

impl CoinGeckoPriceFeed {
    pub fn new(base_url: impl Into<String>, ttl: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("chainvault/0.1")
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
            cache: RwLock::new(HashMap::new()),
            client,
        })
    }

    async fn cached(&self, price_id: &str) -> Option<Decimal> {
        let cache = self.cache.read().await;
        let price = cache.get(price_id)?;
        let age = (Utc::now() - price.last_updated).to_std().unwrap_or_default();
        (age < self.ttl).then_some(price.price_usd)
    }

    async fn update_cache(&self, price_id: &str, price_usd: Decimal) {
        self.cache.write().await.insert(
            price_id.to_string(),
            Price {
                price_id: price_id.to_string(),
                price_usd,
                source: PRICE_SOURCE.to_string(),
                last_updated: Utc::now(),
            },
        );
    }

    /// 从 CoinGecko 获取价格并更新缓存
    async fn fetch_and_update_price(&self, price_id: &str) -> Result<Decimal> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, price_id
        );
        tracing::debug!(price_id, "fetching price from CoinGecko");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::provider_unavailable(PRICE_SOURCE, e))?;

        if !response.status().is_success() {
            return Err(WalletError::provider_unavailable(
                PRICE_SOURCE,
                format!("http status {}", response.status()),
            ));
        }

        let data: CoinGeckoResponse = response.json().await.map_err(|e| WalletError::Rpc {
            chain: PRICE_SOURCE.to_string(),
            message: format!("failed to parse response: {}", e),
        })?;

        let price_f64 = data
            .prices
            .get(price_id)
            .map(|coin| coin.usd)
            .ok_or_else(|| WalletError::Rpc {
                chain: PRICE_SOURCE.to_string(),
                message: format!("price not found for {}", price_id),
            })?;

        // 转换为Decimal以保持精度
        let price = Decimal::from_f64_retain(price_f64).ok_or_else(|| WalletError::Rpc {
            chain: PRICE_SOURCE.to_string(),
            message: format!("invalid price value: {}", price_f64),
        })?;

        self.update_cache(price_id, price).await;
        Ok(price)
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    async fn usd_price(&self, price_id: &str) -> Result<Decimal> {
        if let Some(price) = self.cached(price_id).await {
            return Ok(price);
        }
        self.fetch_and_update_price(price_id).await
    }
}
