//! 外部渲染器（uNmINeD CLI）调用
//!
//! 这里只负责拼参数和启动进程，瓦片算法完全由渲染器完成。

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RenderError;

use super::map_config::{Area, Dimension, MapDefaults, MapDefinition, MapOptions, MapRange, Zoom};

/// 基础渲染写出的视图属性文件
pub const PROPERTIES_FILE: &str = "unmined.map.properties.js";
/// 预览图文件名
pub const PREVIEW_FILE: &str = "preview.png";
/// 预览图固定缩放
const PREVIEW_ZOOM: i32 = 2;

static MAX_ZOOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"maxZoom:\s*\d+").expect("maxZoom 正则无效"));

/// 渲染调用类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderKind {
    /// 整个维度的基础渲染
    Base,
    /// 命名子区域
    Range(String),
    /// 单张预览图
    Preview,
}

/// 一次渲染器调用
#[derive(Debug, Clone)]
pub struct RenderInvocation {
    pub kind: RenderKind,
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl RenderInvocation {
    /// 日志与错误中使用的简短描述
    pub fn label(&self) -> String {
        match &self.kind {
            RenderKind::Base => "base".to_string(),
            RenderKind::Range(name) => format!("range:{name}"),
            RenderKind::Preview => "preview".to_string(),
        }
    }

    /// `--area` 参数的取值（基础渲染没有）
    pub fn area(&self) -> Option<&str> {
        let mut iter = self.args.iter();
        while let Some(arg) = iter.next() {
            if let Some(expr) = arg.strip_prefix("--area=") {
                return Some(expr);
            }
            if arg == "--area" {
                return iter.next().map(String::as_str);
            }
        }
        None
    }
}

/// 渲染器抽象
pub trait MapRenderer: Send + Sync {
    /// 执行一次渲染，渲染器非零退出视为失败
    fn render(
        &self,
        invocation: &RenderInvocation,
    ) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// 通过子进程调用 uNmINeD CLI
#[derive(Debug, Clone)]
pub struct UnminedCli {
    binary: PathBuf,
}

impl UnminedCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl MapRenderer for UnminedCli {
    async fn render(&self, invocation: &RenderInvocation) -> Result<(), RenderError> {
        tracing::debug!(
            binary = %self.binary.display(),
            args = ?invocation.args,
            "调用渲染器"
        );

        let status = tokio::process::Command::new(&self.binary)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| RenderError::Spawn {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RenderError::ExitStatus {
                label: invocation.label(),
                code: status.code(),
            })
        }
    }
}

/// 一次渲染的目标
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget<'a> {
    /// 存档目录（`<world>/world`）
    pub world_dir: &'a Path,
    pub dimension: Dimension,
    /// 地图输出目录
    pub output: &'a Path,
    /// 渲染器自身的日志级别
    pub log_level: &'a str,
}

/// 确认维度下存在 region 数据
pub fn ensure_region_data(world_dir: &Path, dimension: Dimension) -> Result<PathBuf, RenderError> {
    let region = dimension.region_dir(world_dir);
    if region.is_dir() {
        Ok(region)
    } else {
        Err(RenderError::MissingRegionData {
            dimension: dimension.to_string(),
            path: region,
        })
    }
}

/// 基础渲染：缩放取 地图覆盖 > 默认值
pub fn base_invocation(
    target: RenderTarget<'_>,
    defaults: &MapDefaults,
    map: &MapDefinition,
) -> RenderInvocation {
    let zoom = map.resolved_zoom(defaults);
    let mut args = web_render_args(target, defaults, zoom);
    args.extend(option_args(&map.options));
    RenderInvocation {
        kind: RenderKind::Base,
        output: target.output.to_path_buf(),
        args,
    }
}

/// 子区域渲染：缩放取 区域覆盖 > `map_zoom`
pub fn range_invocation(
    target: RenderTarget<'_>,
    defaults: &MapDefaults,
    range: &MapRange,
    map_zoom: Zoom,
    options: &MapOptions,
) -> Result<RenderInvocation, RenderError> {
    let area = range.area();
    if area.is_degenerate() {
        return Err(RenderError::InvalidRange {
            name: range.name.clone(),
            x1: area.x1,
            z1: area.z1,
            x2: area.x2,
            z2: area.z2,
        });
    }

    let mut args = web_render_args(target, defaults, range.resolved_zoom(map_zoom));
    args.push(format!("--area={}", area.to_bounds_expr()));
    args.extend(option_args(options));
    Ok(RenderInvocation {
        kind: RenderKind::Range(range.name.clone()),
        output: target.output.to_path_buf(),
        args,
    })
}

/// 预览图渲染（`image render`）
pub fn preview_invocation(
    target: RenderTarget<'_>,
    area: Area,
    options: &MapOptions,
) -> RenderInvocation {
    let output = target.output.join(PREVIEW_FILE);
    let mut args = vec![
        "image".to_string(),
        "render".to_string(),
        "--world".to_string(),
        target.world_dir.display().to_string(),
        "--dimension".to_string(),
        target.dimension.to_string(),
        "--area".to_string(),
        area.to_bounds_expr(),
        "--zoom".to_string(),
        PREVIEW_ZOOM.to_string(),
        "--log-level".to_string(),
        target.log_level.to_string(),
        "--output".to_string(),
        output.display().to_string(),
    ];
    args.extend(option_args(options));
    RenderInvocation {
        kind: RenderKind::Preview,
        output,
        args,
    }
}

fn web_render_args(target: RenderTarget<'_>, defaults: &MapDefaults, zoom: Zoom) -> Vec<String> {
    vec![
        "web".to_string(),
        "render".to_string(),
        "--world".to_string(),
        target.world_dir.display().to_string(),
        "--dimension".to_string(),
        target.dimension.to_string(),
        "--output".to_string(),
        target.output.display().to_string(),
        "--imageformat".to_string(),
        defaults.imageformat.clone(),
        "--chunkprocessors".to_string(),
        defaults.chunkprocessors.to_string(),
        "--log-level".to_string(),
        target.log_level.to_string(),
        "--zoomout".to_string(),
        zoom.zoom_out.to_string(),
        "--zoomin".to_string(),
        zoom.zoom_in.to_string(),
    ]
}

/// 渲染选项转参数
///
/// `gndxray`、`night`、`players` 只有为 true 时才传，false 与未设置一样不传。
/// `shadows` 设置了就原样传（包括 false）。
pub fn option_args(options: &MapOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(y) = options.top_y {
        args.extend(["--topY".to_string(), y.to_string()]);
    }
    if let Some(y) = options.bottom_y {
        args.extend(["--bottomY".to_string(), y.to_string()]);
    }
    if options.gndxray == Some(true) {
        args.extend(["--gndxray".to_string(), "true".to_string()]);
    }
    if options.night == Some(true) {
        args.extend(["--night".to_string(), "true".to_string()]);
    }
    if let Some(shadows) = options.shadows {
        args.extend(["--shadows".to_string(), shadows.as_flag().to_string()]);
    }
    if options.players == Some(true) {
        args.extend(["--players".to_string(), "true".to_string()]);
    }
    args
}

/// 把视图属性文件里的 `maxZoom` 改成 `max_zoom`
///
/// 返回文件内容是否发生变化。
pub fn patch_max_zoom(output_dir: &Path, max_zoom: i32) -> Result<bool, RenderError> {
    let path = output_dir.join(PROPERTIES_FILE);
    let patch_err = |message: String| RenderError::PropertiesPatch {
        path: path.clone(),
        message,
    };

    let content = std::fs::read_to_string(&path).map_err(|e| patch_err(e.to_string()))?;
    if !MAX_ZOOM_RE.is_match(&content) {
        return Err(patch_err("未找到 maxZoom 字段".to_string()));
    }

    let replacement = format!("maxZoom: {max_zoom}");
    let patched = MAX_ZOOM_RE.replace_all(&content, replacement.as_str());
    if patched == content {
        return Ok(false);
    }
    std::fs::write(&path, patched.as_bytes()).map_err(|e| patch_err(e.to_string()))?;
    Ok(true)
}
