use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置错误（全局配置或 map-config.yml 缺失/无法解析）
    #[error("配置错误: {0}")]
    Config(String),

    /// 世界不存在或存档无法读取
    #[error("世界错误: {0}")]
    World(String),

    /// 构建锁错误
    #[error("构建锁错误: {0}")]
    Lock(#[from] LockError),

    /// 渲染错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),

    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(String),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    Json(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 构建锁错误类型
#[derive(Error, Debug)]
pub enum LockError {
    /// 有界等待超时
    #[error("等待锁超时（{waited:?}）: {path}")]
    Timeout { path: PathBuf, waited: Duration },

    /// 非阻塞模式下锁已被其他进程持有
    #[error("锁已被其他进程持有: {0}")]
    Held(PathBuf),

    /// 底层文件系统错误
    #[error("获取锁失败 {path}: {source}")]
    Acquire {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 释放锁失败
    #[error("释放锁失败 {path}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 单个地图 / 区域渲染的错误类型
///
/// 这类错误只影响当前地图或区域，由调用方记录后跳过。
#[derive(Error, Debug)]
pub enum RenderError {
    /// 维度下没有 region 数据
    #[error("维度 {dimension} 没有 region 数据: {path}")]
    MissingRegionData { dimension: String, path: PathBuf },

    /// 区域边界退化
    #[error("区域 {name} 的边界无效: ({x1},{z1})-({x2},{z2})")]
    InvalidRange {
        name: String,
        x1: i64,
        z1: i64,
        x2: i64,
        z2: i64,
    },

    /// 渲染器进程无法启动
    #[error("无法启动渲染器 {binary}: {message}")]
    Spawn { binary: PathBuf, message: String },

    /// 渲染器非零退出
    #[error("渲染器退出码异常（{label}）: {code:?}")]
    ExitStatus { label: String, code: Option<i32> },

    /// 预览中心点无法计算
    #[error("无法计算预览中心: {0}")]
    PreviewCenter(String),

    /// 修补 unmined.map.properties.js 失败
    #[error("修补 maxZoom 失败 {path}: {message}")]
    PropertiesPatch { path: PathBuf, message: String },

    /// 写入地图清单失败
    #[error("写入地图清单失败 {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
