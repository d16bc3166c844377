use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 清单文件名（地图输出目录与世界目录下同名）
pub const MANIFEST_FILE: &str = "manifest.json";
/// 汇总索引文件名
pub const AGGREGATE_MANIFEST_FILE: &str = "world_manifest.json";
pub const INDEX_HTML_FILE: &str = "index.html";

/// 单张地图的渲染清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub world: String,
    pub map: String,
    pub dimension: String,
    /// 相对地图根目录的输出路径（`<world>/<output_subdir>`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// RFC3339
    pub last_rendered: String,
    pub last_rendered_epoch: i64,
}

impl Manifest {
    pub fn new<Tz: TimeZone>(
        world: &str,
        map: &str,
        dimension: &str,
        path: Option<String>,
        rendered_at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            world: world.to_string(),
            map: map.to_string(),
            dimension: dimension.to_string(),
            path,
            last_rendered: rendered_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            last_rendered_epoch: rendered_at.timestamp(),
        }
    }

    /// 以当前本地时间创建
    pub fn rendered_now(world: &str, map: &str, dimension: &str, path: Option<String>) -> Self {
        Self::new(world, map, dimension, path, &Local::now())
    }

    pub fn read(path: &Path) -> Result<Self, AppError> {
        read_json(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        write_json(path, self)
    }
}

/// 世界清单中的地图条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSummary {
    pub name: String,
    pub dimension: String,
}

/// 世界级清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldManifest {
    pub world: String,
    pub version: String,
    pub difficulty: i32,
    pub difficulty_name: String,
    /// UTC RFC3339，从未游玩时为空串
    pub last_played: String,
    pub maps: Vec<MapSummary>,
    pub last_rendered: String,
}

impl WorldManifest {
    pub fn read(path: &Path) -> Result<Self, AppError> {
        read_json(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        write_json(path, self)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, AppError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// 两空格缩进写出 JSON，必要时创建父目录
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}
