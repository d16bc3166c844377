use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::AppError;

use super::level::read_level_dat;
use super::models::WorldInfo;

/// 存档子目录名
const DATA_DIR: &str = "world";
/// 存档状态文件
const LEVEL_DAT: &str = "level.dat";
/// 每个世界的地图配置文件名
pub const MAP_CONFIG_FILE: &str = "map-config.yml";

/// 世界元数据提供者
///
/// 目录布局：`<worlds_dir>/<name>/world/level.dat`，
/// 没有可读 level.dat 的目录不视为世界。
#[derive(Debug, Clone)]
pub struct WorldStore {
    worlds_dir: PathBuf,
}

impl WorldStore {
    pub fn new(worlds_dir: impl Into<PathBuf>) -> Self {
        Self {
            worlds_dir: worlds_dir.into(),
        }
    }

    pub fn worlds_dir(&self) -> &Path {
        &self.worlds_dir
    }

    pub fn world_root(&self, name: &str) -> PathBuf {
        self.worlds_dir.join(name)
    }

    pub fn data_dir(&self, name: &str) -> PathBuf {
        self.world_root(name).join(DATA_DIR)
    }

    pub fn level_dat_path(&self, name: &str) -> PathBuf {
        self.data_dir(name).join(LEVEL_DAT)
    }

    pub fn map_config_path(&self, name: &str) -> PathBuf {
        self.world_root(name).join(MAP_CONFIG_FILE)
    }

    pub fn exists(&self, name: &str) -> bool {
        is_plain_name(name) && self.level_dat_path(name).is_file()
    }

    /// level.dat 的修改时间（秒）
    pub fn data_modified_at(&self, name: &str) -> Result<i64, AppError> {
        if !is_plain_name(name) {
            return Err(AppError::Validation(format!("无效的世界名: {name}")));
        }
        let path = self.level_dat_path(name);
        let meta = std::fs::metadata(&path)
            .map_err(|_| AppError::World(format!("world not found: {name}")))?;
        let modified = meta
            .modified()
            .map_err(|e| AppError::World(format!("无法读取 {} 的修改时间: {e}", path.display())))?;
        let secs = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        Ok(secs)
    }

    /// 解析世界（读取 level.dat）
    pub fn world_info(&self, name: &str) -> Result<WorldInfo, AppError> {
        let data_modified_at = self.data_modified_at(name)?;
        let level = read_level_dat(&self.level_dat_path(name))?;
        Ok(WorldInfo {
            name: name.to_string(),
            root: self.world_root(name),
            data_dir: self.data_dir(name),
            level,
            data_modified_at,
        })
    }

    /// 列出全部世界名（已排序）
    pub fn list_world_names(&self) -> Result<Vec<String>, AppError> {
        let entries = std::fs::read_dir(&self.worlds_dir).map_err(|e| {
            AppError::World(format!("读取世界目录 {} 失败: {e}", self.worlds_dir.display()))
        })?;

        let mut names = BTreeSet::new();
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str()
                && self.exists(name)
            {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    /// 展开世界名模式
    ///
    /// 不含 `*?[]` 时按字面名处理；否则匹配 `<worlds_dir>/<pattern>/world/level.dat`，
    /// 结果去重并排序，零匹配视为错误。
    pub fn expand_pattern(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        if !has_glob_meta(pattern) {
            if !self.exists(pattern) {
                return Err(AppError::World(format!("world not found: {pattern}")));
            }
            return Ok(vec![pattern.to_string()]);
        }

        let full = format!(
            "{}/{}/{}/{}",
            glob::Pattern::escape(&self.worlds_dir.to_string_lossy()),
            pattern,
            DATA_DIR,
            LEVEL_DAT
        );
        let paths = glob::glob(&full)
            .map_err(|e| AppError::Validation(format!("无效的世界匹配模式 {pattern}: {e}")))?;

        let mut names = BTreeSet::new();
        for path in paths.flatten() {
            let first = path
                .strip_prefix(&self.worlds_dir)
                .ok()
                .and_then(|rel| rel.components().next());
            if let Some(Component::Normal(name)) = first
                && let Some(name) = name.to_str()
            {
                names.insert(name.to_string());
            }
        }

        if names.is_empty() {
            return Err(AppError::World(format!("no worlds match pattern: {pattern}")));
        }
        Ok(names.into_iter().collect())
    }

    /// 依次展开多个模式，保持首次出现顺序并去重
    pub fn expand_patterns(&self, patterns: &[String]) -> Result<Vec<String>, AppError> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for pattern in patterns {
            for name in self.expand_pattern(pattern)? {
                if seen.insert(name.clone()) {
                    out.push(name);
                }
            }
        }
        Ok(out)
    }
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']'])
}

/// 世界名只能是单级目录名
fn is_plain_name(name: &str) -> bool {
    let mut comps = Path::new(name).components();
    matches!(comps.next(), Some(Component::Normal(_))) && comps.next().is_none()
}
