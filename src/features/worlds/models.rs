use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// level.dat 根结构（根复合标签下只有 `Data`）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelDat {
    #[serde(rename = "Data")]
    pub data: LevelInfo,
}

/// level.dat 中本工具关心的字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelInfo {
    #[serde(rename = "LevelName", default)]
    pub level_name: String,
    /// 游戏版本（1.9+ 存档才有）
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionTag>,
    #[serde(rename = "DataVersion", default, skip_serializing_if = "Option::is_none")]
    pub data_version: Option<i32>,
    #[serde(rename = "SpawnX", default)]
    pub spawn_x: i32,
    #[serde(rename = "SpawnY", default)]
    pub spawn_y: i32,
    #[serde(rename = "SpawnZ", default)]
    pub spawn_z: i32,
    /// 上次游玩时间（毫秒时间戳）
    #[serde(rename = "LastPlayed", default)]
    pub last_played: i64,
    #[serde(rename = "Difficulty", default)]
    pub difficulty: i32,
    #[serde(rename = "GameType", default)]
    pub game_type: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionTag {
    #[serde(rename = "Id", default)]
    pub id: i32,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Snapshot", default)]
    pub snapshot: i8,
}

impl LevelInfo {
    /// 展示用版本号：`Version.Name`，否则 `DataVersion N`，否则 `Unknown`
    pub fn version_name(&self) -> String {
        if let Some(v) = &self.version
            && !v.name.is_empty()
        {
            return v.name.clone();
        }
        match self.data_version {
            Some(dv) if dv > 0 => format!("DataVersion {dv}"),
            _ => "Unknown".to_string(),
        }
    }

    pub fn difficulty_name(&self) -> &'static str {
        difficulty_name(self.difficulty)
    }

    /// 上次游玩时间（UTC RFC3339），从未游玩时为空串
    pub fn last_played_rfc3339(&self) -> String {
        if self.last_played <= 0 {
            return String::new();
        }
        DateTime::from_timestamp(self.last_played / 1000, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}

pub fn difficulty_name(difficulty: i32) -> &'static str {
    match difficulty {
        0 => "Peaceful",
        1 => "Easy",
        2 => "Normal",
        3 => "Hard",
        _ => "Unknown",
    }
}

/// 已解析的世界
#[derive(Debug, Clone)]
pub struct WorldInfo {
    pub name: String,
    /// 世界根目录（含 map-config.yml）
    pub root: PathBuf,
    /// 存档目录（含 level.dat 与 region/）
    pub data_dir: PathBuf,
    pub level: LevelInfo,
    /// level.dat 修改时间（秒）
    pub data_modified_at: i64,
}
