/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 启动检查模块
pub mod startup;

/// 功能聚合模块
pub mod features;

/// 跨进程构建锁
pub mod lock;

/// 终止信号处理模块
pub mod shutdown;

// 导出常用类型供外部使用
pub use config::AppConfig;
pub use error::{AppError, LockError, RenderError};
pub use lock::{FileLock, LockMode};
pub use shutdown::ShutdownReason;
