//! 串行写入队列
//!
//! 所有数据库操作以任务形式投递到单一后台任务，按提交顺序逐个执行，
//! 调用方通过 oneshot 通道异步等待结果。

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::storage::{Storage, StorageError, StorageResult};

type Job = Box<dyn FnOnce(&Storage) + Send + 'static>;

/// 后台存储任务句柄，可廉价克隆
#[derive(Clone)]
pub struct StoreWorker {
    tx: mpsc::UnboundedSender<Job>,
}

impl StoreWorker {
    /// 启动后台任务，必须在 tokio 运行时内调用
    pub fn spawn(storage: Storage) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            debug!(db_path = %storage.db_path(), "store worker started");
            while let Some(job) = rx.recv().await {
                let storage = storage.clone();
                // 阻塞的 SQLite 调用放到阻塞线程池，一次只执行一个任务
                if let Err(e) = tokio::task::spawn_blocking(move || job(&storage)).await {
                    error!(error = %e, "store job panicked");
                }
            }
            debug!("store worker stopped");
        });

        Self { tx }
    }

    /// 提交任务并等待其结果
    pub async fn run<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Storage) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |storage| {
            let _ = reply_tx.send(f(storage));
        });

        self.tx
            .send(job)
            .map_err(|_| StorageError::Worker("store worker has shut down".to_string()))?;

        reply_rx
            .await
            .map_err(|_| StorageError::Worker("store job dropped before completing".to_string()))?
    }
}
