//! 跨进程构建锁
//!
//! 基于锁文件的建议性排他锁（Unix 下为 flock）。持锁期间会安装终止信号监听，
//! 收到 SIGINT/SIGTERM 时先释放锁再退出进程，避免被杀掉的构建遗留死锁。

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::LockError;
use crate::shutdown;

/// 重试间隔
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// 获取模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// 一直等待直到获得锁
    Blocking,
    /// 等待至多给定时长
    Bounded(Duration),
    /// 只尝试一次
    NonBlocking,
}

impl LockMode {
    /// 由命令行标志推导获取模式；`--non-blocking` 优先于超时
    pub fn from_flags(non_blocking: bool, timeout: Option<Duration>) -> Self {
        match (non_blocking, timeout) {
            (true, _) => LockMode::NonBlocking,
            (false, Some(t)) if !t.is_zero() => LockMode::Bounded(t),
            _ => LockMode::Blocking,
        }
    }
}

/// 锁文件句柄
///
/// `new` 只记录路径，`acquire` 成功后才真正持有锁。
/// 释放是幂等的，`Drop` 时也会自动释放。
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Arc<Mutex<Option<File>>>,
    released: Option<Arc<Notify>>,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Arc::new(Mutex::new(None)),
            released: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前句柄是否持有锁
    pub fn is_held(&self) -> bool {
        match self.file.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// 获取锁
    ///
    /// 锁文件不存在时创建，已存在时不截断也不修改内容。
    /// 锁文件所在目录不会被创建。
    pub async fn acquire(&mut self, mode: LockMode) -> Result<(), LockError> {
        if self.is_held() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| LockError::Acquire {
                path: self.path.clone(),
                source,
            })?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => break,
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Error(source)) => {
                    return Err(LockError::Acquire {
                        path: self.path.clone(),
                        source,
                    });
                }
            }

            let wait = match mode {
                LockMode::NonBlocking => return Err(LockError::Held(self.path.clone())),
                LockMode::Blocking => RETRY_INTERVAL,
                LockMode::Bounded(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(LockError::Timeout {
                            path: self.path.clone(),
                            waited: elapsed,
                        });
                    }
                    // 最后一次等待截断到剩余时间
                    RETRY_INTERVAL.min(limit - elapsed)
                }
            };
            tokio::time::sleep(wait).await;
        }

        match self.file.lock() {
            Ok(mut guard) => *guard = Some(file),
            Err(poisoned) => *poisoned.into_inner() = Some(file),
        }
        tracing::debug!("已获取构建锁: {}", self.path.display());

        self.install_signal_guard();
        Ok(())
    }

    /// 释放锁；未持有或重复释放均为空操作
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(released) = self.released.take() {
            released.notify_one();
        }
        release_slot(&self.file, &self.path)
    }

    /// 持锁期间监听终止信号：收到后释放锁并以信号对应的退出码结束进程
    fn install_signal_guard(&mut self) {
        let released = Arc::new(Notify::new());
        let notified = Arc::clone(&released);
        let file = Arc::clone(&self.file);
        let path = self.path.clone();

        tokio::spawn(async move {
            tokio::select! {
                reason = shutdown::wait_for_termination() => match reason {
                    Ok(reason) => {
                        tracing::warn!(lock = %path.display(), "持锁期间收到终止信号，释放锁后退出");
                        if let Err(e) = release_slot(&file, &path) {
                            tracing::error!("{}", e);
                        }
                        std::process::exit(reason.exit_code());
                    }
                    Err(e) => tracing::warn!("无法为构建锁安装信号监听: {}", e),
                },
                _ = notified.notified() => {}
            }
        });

        self.released = Some(released);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("{}", e);
        }
    }
}

fn release_slot(slot: &Mutex<Option<File>>, path: &Path) -> Result<(), LockError> {
    let file = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(file) = file {
        file.unlock().map_err(|source| LockError::Release {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("已释放构建锁: {}", path.display());
    }
    Ok(())
}
