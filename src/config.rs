use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 默认配置文件路径
const DEFAULT_CONFIG_PATH: &str = "/etc/mapctl.toml";

/// 目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// 世界根目录（每个世界为 `<worlds_dir>/<name>`）
    #[serde(default = "PathsConfig::default_worlds_dir")]
    pub worlds_dir: String,
    /// 地图输出根目录
    #[serde(default = "PathsConfig::default_maps_dir")]
    pub maps_dir: String,
}

impl PathsConfig {
    fn default_worlds_dir() -> String {
        "/srv/minecraft-server".to_string()
    }
    fn default_maps_dir() -> String {
        "/srv/minecraft-server/maps".to_string()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            worlds_dir: Self::default_worlds_dir(),
            maps_dir: Self::default_maps_dir(),
        }
    }
}

/// 构建锁配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// 锁文件路径
    #[serde(default = "LockConfig::default_path")]
    pub path: String,
    /// 等待超时（秒，0=一直等待）
    #[serde(default)]
    pub timeout_secs: u64,
}

impl LockConfig {
    fn default_path() -> String {
        "/tmp/minecraft-map-build.lock".to_string()
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            timeout_secs: 0,
        }
    }
}

/// 外部渲染器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// uNmINeD CLI 可执行文件路径
    #[serde(default = "RendererConfig::default_binary")]
    pub binary: String,
    /// 传给渲染器的 `--log-level`
    #[serde(default = "RendererConfig::default_log_level")]
    pub log_level: String,
}

impl RendererConfig {
    fn default_binary() -> String {
        "/opt/unmined/unmined-cli".to_string()
    }
    fn default_log_level() -> String {
        "warning".to_string()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            binary: Self::default_binary(),
            log_level: Self::default_log_level(),
        }
    }
}

/// 批量构建配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    /// 并行模式下的最大并发世界数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_workers: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式（full | compact）
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 → 配置文件（可缺省）→ 环境变量
    ///
    /// 环境变量形如 `MAPCTL_PATHS__WORLDS_DIR`、`MAPCTL_LOCK__TIMEOUT_SECS`。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(path);

        tracing::debug!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?)
            // 显式指定的配置文件必须存在
            .add_source(File::from(config_path.as_path()).required(path.is_some()))
            .add_source(
                Environment::with_prefix("MAPCTL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    ///
    /// 仅供二进制入口使用；库内操作均显式接收配置。
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global(path: Option<&Path>) -> Result<&'static AppConfig, ConfigError> {
        let config = Self::load(path)?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(Self::global())
    }

    /// 获取配置文件路径：命令行参数 > `MAPCTL_CONFIG` > 默认路径
    fn get_config_path(path: Option<&Path>) -> PathBuf {
        if let Some(p) = path {
            return p.to_path_buf();
        }
        std::env::var_os("MAPCTL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// 世界根目录
    pub fn worlds_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.worlds_dir)
    }

    /// 地图输出根目录
    pub fn maps_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.maps_dir)
    }

    /// 构建锁路径
    pub fn lock_path(&self) -> PathBuf {
        PathBuf::from(&self.lock.path)
    }

    /// 渲染器可执行文件路径
    pub fn renderer_binary(&self) -> PathBuf {
        PathBuf::from(&self.renderer.binary)
    }

    /// 配置中的锁等待超时（`None` 表示一直等待）
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock.timeout_secs > 0).then(|| Duration::from_secs(self.lock.timeout_secs))
    }

    /// 实际使用的并发数
    pub fn max_workers(&self) -> usize {
        match self.build.max_workers {
            0 => num_cpus::get(),
            n => n as usize,
        }
    }
}

/// 解析时长字符串，例如 `500ms`、`30s`、`5m`、`1h30m`；纯数字按秒处理。
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("时长不能为空".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("时长缺少单位: {input}"))?;
        if digits == 0 {
            return Err(format!("无效的时长: {input}"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|e| format!("无效的时长 {input}: {e}"))?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let too_large = || format!("时长过大: {input}");
        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(too_large)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(too_large)?),
            other => return Err(format!("未知的时长单位 '{other}': {input}")),
        };
        total = total.checked_add(part).ok_or_else(too_large)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_layout() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.paths.worlds_dir, "/srv/minecraft-server");
        assert_eq!(cfg.paths.maps_dir, "/srv/minecraft-server/maps");
        assert_eq!(cfg.lock.path, "/tmp/minecraft-map-build.lock");
        assert_eq!(cfg.renderer.binary, "/opt/unmined/unmined-cli");
        assert_eq!(cfg.renderer.log_level, "warning");
        assert!(cfg.lock_timeout().is_none());
    }

    #[test]
    fn missing_default_file_falls_back_to_builtin_values() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.logging.format, "full");
    }

    #[test]
    fn max_workers_zero_means_cpu_count() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.max_workers(), num_cpus::get());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("ms").is_err());

        let err = parse_duration("99999999999999999h").unwrap_err();
        assert!(err.contains("时长过大"), "{err}");
        assert!(parse_duration("18446744073709551615s1s").is_err());
    }
}
