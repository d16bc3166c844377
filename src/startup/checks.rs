use crate::config::AppConfig;
use crate::error::AppError;
use std::fs;

/// 当前命令需要的外部资源
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupRequirements {
    /// 需要调用渲染器
    pub renderer: bool,
    /// 需要写地图输出目录
    pub maps_dir: bool,
}

/// 执行启动检查
///
/// 1. 检查世界根目录（缺失只告警）
/// 2. 检查并创建地图输出目录
/// 3. 检查渲染器可执行文件
pub fn run_startup_checks(config: &AppConfig, needs: StartupRequirements) -> Result<(), AppError> {
    tracing::debug!("🔍 开始执行启动检查...");

    check_worlds_dir(config);

    if needs.maps_dir {
        ensure_maps_dir(config)?;
    }

    if needs.renderer {
        ensure_renderer(config)?;
    }

    tracing::debug!("✅ 启动检查完成");
    Ok(())
}

fn check_worlds_dir(config: &AppConfig) {
    let worlds_dir = config.worlds_dir();
    if !worlds_dir.is_dir() {
        tracing::warn!("⚠️ 世界目录不存在: {:?}", worlds_dir);
    }
}

/// 确保地图输出目录存在
fn ensure_maps_dir(config: &AppConfig) -> Result<(), AppError> {
    let maps_dir = config.maps_dir();

    if !maps_dir.exists() {
        tracing::warn!("📁 未找到地图输出目录，正在创建: {:?}", maps_dir);
        fs::create_dir_all(&maps_dir)
            .map_err(|e| AppError::Io(format!("创建地图输出目录 {maps_dir:?} 失败: {e}")))?;
        tracing::info!("✅ 地图输出目录创建成功");
    } else if !maps_dir.is_dir() {
        return Err(AppError::Config(format!(
            "地图输出路径不是目录: {maps_dir:?}"
        )));
    }

    Ok(())
}

/// 确保渲染器存在
fn ensure_renderer(config: &AppConfig) -> Result<(), AppError> {
    let binary = config.renderer_binary();
    if !binary.is_file() {
        return Err(AppError::Config(format!(
            "未找到渲染器: {binary:?}（可通过 renderer.binary 或 MAPCTL_RENDERER__BINARY 配置）"
        )));
    }
    tracing::debug!("✅ 渲染器: {:?}", binary);
    Ok(())
}
