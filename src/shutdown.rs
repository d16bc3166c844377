//! 终止信号处理模块
//!
//! 监听 SIGINT、SIGTERM（Windows 下为 Ctrl+C），
//! 供构建锁与命令入口在收到信号时完成清理并退出。

use tracing::{debug, info};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
}

impl ShutdownReason {
    /// 按 shell 约定返回进程退出码（128 + 信号编号）
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownReason::Interrupt => 130,
            ShutdownReason::Terminate => 143,
        }
    }
}

/// 信号处理错误类型
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}

/// 等待下一个终止信号
///
/// 每次调用都会注册新的监听器，可在多个任务中并发等待。
pub async fn wait_for_termination() -> Result<ShutdownReason, ShutdownError> {
    #[cfg(unix)]
    {
        wait_unix().await
    }

    #[cfg(windows)]
    {
        wait_windows().await
    }
}

#[cfg(unix)]
async fn wait_unix() -> Result<ShutdownReason, ShutdownError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;

    debug!("已注册 SIGINT/SIGTERM 监听");

    let reason = tokio::select! {
        _ = sigint.recv() => {
            info!("接收到SIGINT信号 (Ctrl+C)");
            ShutdownReason::Interrupt
        }
        _ = sigterm.recv() => {
            info!("接收到SIGTERM信号");
            ShutdownReason::Terminate
        }
    };
    Ok(reason)
}

#[cfg(windows)]
async fn wait_windows() -> Result<ShutdownReason, ShutdownError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
    info!("接收到Ctrl+C信号");
    Ok(ShutdownReason::Interrupt)
}
