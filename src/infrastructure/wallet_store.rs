//! 钱包记录存储
//!
//! 记录只包含地址和密文。文件实现每个钱包一个 JSON 文件，
//! 写入走临时文件 + rename，读改写在同一把锁内完成。
//! 文件 I/O 和读改写回调（通常是 PBKDF2 重新加密）都放到阻塞线程池执行

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::stored_wallet::StoredWallet,
    error::{Result, WalletError},
};

/// 读改写回调
pub type WalletUpdate = Box<dyn FnOnce(StoredWallet) -> Result<StoredWallet> + Send>;

/// 在阻塞线程池执行，避免占用异步工作线程
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletError::Storage(format!("blocking task failed: {}", e)))?
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn load(&self, wallet_id: &str) -> Result<StoredWallet>;

    async fn save(&self, wallet_id: &str, wallet: &StoredWallet) -> Result<()>;

    async fn delete(&self, wallet_id: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<String>>;

    /// 原子读改写，回调失败时记录保持不变
    async fn update(&self, wallet_id: &str, f: WalletUpdate) -> Result<StoredWallet>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 内存实现
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct InMemoryWalletStore {
    wallets: Mutex<HashMap<String, StoredWallet>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn load(&self, wallet_id: &str) -> Result<StoredWallet> {
        self.wallets
            .lock()
            .await
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))
    }

    async fn save(&self, wallet_id: &str, wallet: &StoredWallet) -> Result<()> {
        self.wallets
            .lock()
            .await
            .insert(wallet_id.to_string(), wallet.clone());
        Ok(())
    }

    async fn delete(&self, wallet_id: &str) -> Result<()> {
        self.wallets
            .lock()
            .await
            .remove(wallet_id)
            .map(|_| ())
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.wallets.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn update(&self, wallet_id: &str, f: WalletUpdate) -> Result<StoredWallet> {
        let mut wallets = self.wallets.lock().await;
        let current = wallets
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?;

        let updated = run_blocking(move || f(current)).await?;
        wallets.insert(wallet_id.to_string(), updated.clone());
        Ok(updated)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 文件实现
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FileWalletStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileWalletStore {
    /// 打开（必要时创建）存储目录
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn record_path(dir: &Path, wallet_id: &str) -> Result<PathBuf> {
    let valid = !wallet_id.is_empty()
        && wallet_id.len() <= 64
        && wallet_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(WalletError::Storage(format!(
            "invalid wallet id: {:?}",
            wallet_id
        )));
    }
    Ok(dir.join(format!("{}.json", wallet_id)))
}

fn read_record(dir: &Path, wallet_id: &str) -> Result<StoredWallet> {
    let path = record_path(dir, wallet_id)?;
    let json = match std::fs::read_to_string(&path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WalletError::WalletNotFound(wallet_id.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&json)
        .map_err(|e| WalletError::Storage(format!("corrupted record {}: {}", wallet_id, e)))
}

/// 写入临时文件后原子替换
fn write_record(dir: &Path, wallet_id: &str, wallet: &StoredWallet) -> Result<()> {
    let path = record_path(dir, wallet_id)?;
    let json =
        serde_json::to_vec_pretty(wallet).map_err(|e| WalletError::Storage(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path)
        .map_err(|e| WalletError::Storage(format!("failed to persist {}: {}", wallet_id, e)))?;

    tracing::debug!(wallet_id, "wallet record written");
    Ok(())
}

fn list_records(dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

#[async_trait]
impl WalletStore for FileWalletStore {
    async fn load(&self, wallet_id: &str) -> Result<StoredWallet> {
        let _guard = self.lock.lock().await;
        let (dir, id) = (self.dir.clone(), wallet_id.to_string());
        run_blocking(move || read_record(&dir, &id)).await
    }

    async fn save(&self, wallet_id: &str, wallet: &StoredWallet) -> Result<()> {
        let _guard = self.lock.lock().await;
        let (dir, id, wallet) = (self.dir.clone(), wallet_id.to_string(), wallet.clone());
        run_blocking(move || write_record(&dir, &id, &wallet)).await
    }

    async fn delete(&self, wallet_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let (dir, id) = (self.dir.clone(), wallet_id.to_string());
        run_blocking(move || {
            let path = record_path(&dir, &id)?;
            match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(WalletError::WalletNotFound(id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let dir = self.dir.clone();
        run_blocking(move || list_records(&dir)).await
    }

    async fn update(&self, wallet_id: &str, f: WalletUpdate) -> Result<StoredWallet> {
        let _guard = self.lock.lock().await;
        let (dir, id) = (self.dir.clone(), wallet_id.to_string());
        run_blocking(move || {
            let current = read_record(&dir, &id)?;
            let updated = f(current)?;
            write_record(&dir, &id, &updated)?;
            Ok(updated)
        })
        .await
    }
}
