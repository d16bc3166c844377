//! 世界清单与汇总索引
//!
//! 世界清单每次整体重写；汇总索引扫描地图根目录下全部世界清单，
//! 重新生成 `world_manifest.json` 与 `index.html`。

use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::error::AppError;

use super::builder::MapBuilder;
use super::map_config::MapConfig;
use super::models::{
    AGGREGATE_MANIFEST_FILE, INDEX_HTML_FILE, MANIFEST_FILE, Manifest, MapSummary, WorldManifest,
    write_json,
};
use super::render::MapRenderer;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Minecraft Maps</title>
</head>
<body>
  <h1>Minecraft Worlds</h1>
  <ul>
{%- for world in worlds %}
    <li>{{ world.name }}
      <ul>
{%- for map in world.maps %}
        <li><a href="./{{ world.name }}/{{ map }}/">{{ map }}</a></li>
{%- endfor %}
      </ul>
    </li>
{%- endfor %}
  </ul>
</body>
</html>
"#;

/// 世界清单构建选项
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// 是否生成预览图
    pub generate_previews: bool,
    /// 只生成预览图，不写清单
    pub preview_only: bool,
    /// 渲染器日志级别（预览图使用）
    pub log_level: String,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            generate_previews: true,
            preview_only: false,
            log_level: "warning".to_string(),
        }
    }
}

/// 汇总索引的生成结果
#[derive(Debug)]
pub struct AggregateIndex {
    pub worlds: Vec<WorldManifest>,
    pub json_path: PathBuf,
    pub html_path: PathBuf,
}

#[derive(Serialize)]
struct IndexWorld {
    name: String,
    maps: Vec<String>,
}

/// 清单构建器
#[derive(Debug, Clone)]
pub struct ManifestBuilder<R> {
    builder: MapBuilder<R>,
}

impl<R: MapRenderer> ManifestBuilder<R> {
    pub fn new(builder: MapBuilder<R>) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &MapBuilder<R> {
        &self.builder
    }

    /// 为一个世界生成预览图与世界清单
    ///
    /// `preview_only` 时返回 `None`。
    pub async fn build_world(
        &self,
        world: &str,
        opts: &ManifestOptions,
    ) -> Result<Option<WorldManifest>, AppError> {
        let info = self.builder.worlds().world_info(world)?;
        let config = MapConfig::load(&info.root)?;
        let world_out = self.builder.world_output_dir(world);
        std::fs::create_dir_all(&world_out)?;

        if opts.generate_previews || opts.preview_only {
            for map in &config.maps {
                if let Err(e) = self
                    .builder
                    .generate_preview(world, &map.name, &opts.log_level)
                    .await
                {
                    tracing::warn!(world, map = %map.name, error = %e, "预览图生成失败");
                }
            }
        }

        if opts.preview_only {
            return Ok(None);
        }

        for map in &config.maps {
            let manifest_path = self.builder.map_output_dir(world, map).join(MANIFEST_FILE);
            let mut manifest = match Manifest::read(&manifest_path) {
                Ok(m) => m,
                Err(_) => {
                    tracing::debug!(world, map = %map.name, "地图尚未渲染，没有清单");
                    continue;
                }
            };
            let path = Some(format!("{world}/{}", map.output_subdir()));
            if manifest.path != path {
                manifest.path = path;
                if let Err(e) = manifest.write(&manifest_path) {
                    tracing::warn!(world, map = %map.name, error = %e, "更新地图清单失败");
                }
            }
        }

        let world_manifest = WorldManifest {
            world: world.to_string(),
            version: info.level.version_name(),
            difficulty: info.level.difficulty,
            difficulty_name: info.level.difficulty_name().to_string(),
            last_played: info.level.last_played_rfc3339(),
            maps: config
                .maps
                .iter()
                .map(|m| MapSummary {
                    name: m.name.clone(),
                    dimension: m.dimension.to_string(),
                })
                .collect(),
            last_rendered: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        world_manifest.write(&world_out.join(MANIFEST_FILE))?;

        tracing::info!(world, maps = world_manifest.maps.len(), "世界清单已更新");
        Ok(Some(world_manifest))
    }
}

/// 重新生成 `world_manifest.json` 与 `index.html`
///
/// 缺少世界清单的目录静默跳过，无法解析的记日志后跳过。
pub fn build_aggregate_index(maps_dir: &Path) -> Result<AggregateIndex, AppError> {
    let entries = std::fs::read_dir(maps_dir).map_err(|e| {
        AppError::Io(format!("读取地图目录 {} 失败: {e}", maps_dir.display()))
    })?;

    let mut world_dirs: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok().map(|n| (n, e.path())))
        .collect();
    world_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut manifests = Vec::new();
    let mut index_worlds = Vec::new();
    for (name, dir) in world_dirs {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            continue;
        }
        match WorldManifest::read(&manifest_path) {
            Ok(m) => {
                index_worlds.push(IndexWorld {
                    name,
                    maps: list_map_dirs(&dir),
                });
                manifests.push(m);
            }
            Err(e) => {
                tracing::warn!(world = %name, error = %e, "无法解析世界清单，跳过");
            }
        }
    }

    let json_path = maps_dir.join(AGGREGATE_MANIFEST_FILE);
    write_json(&json_path, &manifests)?;

    let html_path = maps_dir.join(INDEX_HTML_FILE);
    std::fs::write(&html_path, render_index(&index_worlds)?)?;

    tracing::info!(worlds = manifests.len(), "汇总索引已生成");
    Ok(AggregateIndex {
        worlds: manifests,
        json_path,
        html_path,
    })
}

/// 世界输出目录下的地图子目录（已排序）
fn list_map_dirs(world_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(world_dir) else {
        return Vec::new();
    };
    let mut maps: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    maps.sort();
    maps
}

fn render_index(worlds: &[IndexWorld]) -> Result<String, AppError> {
    let mut env = Environment::new();
    env.add_template(INDEX_HTML_FILE, INDEX_TEMPLATE)
        .map_err(|e| AppError::Internal(format!("加载 index.html 模板失败: {e}")))?;
    let tpl = env
        .get_template(INDEX_HTML_FILE)
        .map_err(|e| AppError::Internal(format!("加载 index.html 模板失败: {e}")))?;
    tpl.render(context! { worlds => worlds })
        .map_err(|e| AppError::Internal(format!("渲染 index.html 失败: {e}")))
}
