//! 单个世界的地图构建
//!
//! 流程：获取构建锁 → 读取 map-config.yml 与存档修改时间 → 逐张地图：
//! 过期检查、region 检查、先渲染子区域再渲染基础图、修补 maxZoom、写清单。
//! 单张地图的失败只记日志并跳过，只有锁与配置错误会让整个世界失败。

use std::path::{Path, PathBuf};

use crate::error::{AppError, LockError, RenderError};
use crate::features::worlds::WorldStore;
use crate::lock::{FileLock, LockMode};

use super::map_config::{MapConfig, MapDefinition};
use super::models::{MANIFEST_FILE, Manifest};
use super::render::{
    MapRenderer, RenderTarget, base_invocation, ensure_region_data, patch_max_zoom,
    range_invocation,
};
use super::staleness::is_up_to_date;

/// 构建锁设置
#[derive(Debug, Clone)]
pub struct LockSettings {
    pub path: PathBuf,
    pub mode: LockMode,
}

/// 构建选项
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// 只构建指定名称的地图
    pub map: Option<String>,
    /// 忽略清单，强制重新渲染
    pub force: bool,
    /// `None` 表示不加锁（`--no-lock`）
    pub lock: Option<LockSettings>,
    /// 渲染器日志级别
    pub log_level: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            map: None,
            force: false,
            lock: None,
            log_level: "warning".to_string(),
        }
    }
}

/// 单张地图的构建结果
#[derive(Debug)]
pub enum MapOutcome {
    /// 基础渲染成功并已写清单
    Rendered {
        /// 失败的子区域
        failed_ranges: Vec<String>,
        /// 修补后的 maxZoom（未修补为 None）
        max_zoom_patched: Option<i32>,
    },
    /// 清单比存档新，未渲染
    UpToDate,
    /// 维度没有 region 数据
    Skipped(RenderError),
    /// 基础渲染或清单写入失败
    Failed(RenderError),
}

/// 单个世界的构建报告
#[derive(Debug)]
pub struct BuildReport {
    pub world: String,
    /// 非阻塞模式下锁被占用，什么都没做
    pub lock_busy: bool,
    /// `(地图名, 结果)`，按配置顺序
    pub maps: Vec<(String, MapOutcome)>,
}

impl BuildReport {
    fn new(world: &str) -> Self {
        Self {
            world: world.to_string(),
            lock_busy: false,
            maps: Vec::new(),
        }
    }

    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, MapOutcome::Rendered { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, MapOutcome::UpToDate))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MapOutcome::Skipped(_) | MapOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&MapOutcome) -> bool) -> usize {
        self.maps.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// 地图构建器
#[derive(Debug, Clone)]
pub struct MapBuilder<R> {
    worlds: WorldStore,
    maps_dir: PathBuf,
    renderer: R,
}

impl<R: MapRenderer> MapBuilder<R> {
    pub fn new(worlds: WorldStore, maps_dir: impl Into<PathBuf>, renderer: R) -> Self {
        Self {
            worlds,
            maps_dir: maps_dir.into(),
            renderer,
        }
    }

    pub fn worlds(&self) -> &WorldStore {
        &self.worlds
    }

    pub fn maps_dir(&self) -> &Path {
        &self.maps_dir
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// `<maps_dir>/<world>`
    pub fn world_output_dir(&self, world: &str) -> PathBuf {
        self.maps_dir.join(world)
    }

    /// `<maps_dir>/<world>/<output_subdir>`
    pub fn map_output_dir(&self, world: &str, map: &MapDefinition) -> PathBuf {
        self.world_output_dir(world).join(map.output_subdir())
    }

    /// 构建一个世界的全部（或指定）地图
    pub async fn build(&self, world: &str, opts: &BuildOptions) -> Result<BuildReport, AppError> {
        let mut lock = None;
        if let Some(settings) = &opts.lock {
            let mut file_lock = FileLock::new(&settings.path);
            match file_lock.acquire(settings.mode).await {
                Ok(()) => lock = Some(file_lock),
                Err(LockError::Held(path)) => {
                    tracing::info!(
                        world,
                        lock = %path.display(),
                        "另一个地图构建正在进行，跳过"
                    );
                    let mut report = BuildReport::new(world);
                    report.lock_busy = true;
                    return Ok(report);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let result = self.build_locked(world, opts).await;

        if let Some(mut file_lock) = lock
            && let Err(e) = file_lock.release()
        {
            tracing::warn!(world, "{}", e);
        }
        result
    }

    async fn build_locked(
        &self,
        world: &str,
        opts: &BuildOptions,
    ) -> Result<BuildReport, AppError> {
        let config = MapConfig::load(&self.worlds.world_root(world))?;
        let data_modified_at = self.worlds.data_modified_at(world)?;
        let world_dir = self.worlds.data_dir(world);

        std::fs::create_dir_all(self.world_output_dir(world)).map_err(|e| {
            AppError::Io(format!(
                "创建输出目录 {} 失败: {e}",
                self.world_output_dir(world).display()
            ))
        })?;

        let mut report = BuildReport::new(world);
        let selected: Vec<&MapDefinition> = config
            .maps
            .iter()
            .filter(|m| opts.map.as_deref().is_none_or(|name| m.name == name))
            .collect();
        if selected.is_empty()
            && let Some(name) = &opts.map
        {
            tracing::warn!(world, map = %name, "map-config.yml 中没有该地图");
        }

        for map in selected {
            let outcome = self
                .build_map(world, &world_dir, data_modified_at, &config, map, opts)
                .await;
            report.maps.push((map.name.clone(), outcome));
        }

        tracing::info!(
            world,
            rendered = report.rendered(),
            up_to_date = report.up_to_date(),
            failed = report.failed(),
            "世界地图构建完成"
        );
        Ok(report)
    }

    async fn build_map(
        &self,
        world: &str,
        world_dir: &Path,
        data_modified_at: i64,
        config: &MapConfig,
        map: &MapDefinition,
        opts: &BuildOptions,
    ) -> MapOutcome {
        let output = self.map_output_dir(world, map);
        let manifest_path = output.join(MANIFEST_FILE);

        if !opts.force && is_up_to_date(&manifest_path, data_modified_at) {
            tracing::info!(world, map = %map.name, "地图已是最新，跳过");
            return MapOutcome::UpToDate;
        }

        if let Err(e) = ensure_region_data(world_dir, map.dimension) {
            tracing::warn!(world, map = %map.name, error = %e, "跳过地图");
            return MapOutcome::Skipped(e);
        }

        let target = RenderTarget {
            world_dir,
            dimension: map.dimension,
            output: &output,
            log_level: &opts.log_level,
        };
        let map_zoom = map.resolved_zoom(&config.defaults);
        let deepest_range_zoom = map
            .ranges
            .iter()
            .map(|r| r.resolved_zoom(map_zoom).zoom_in)
            .max();

        // 子区域必须在基础渲染之前：基础渲染会重写整张地图的视图边界
        let mut failed_ranges = Vec::new();
        for range in &map.ranges {
            let invocation =
                range_invocation(target, &config.defaults, range, map_zoom, &map.options);
            let rendered = match invocation {
                Ok(invocation) => self.renderer.render(&invocation).await,
                Err(e) => Err(e),
            };
            match rendered {
                Ok(()) => {
                    tracing::info!(world, map = %map.name, range = %range.name, "子区域渲染完成")
                }
                Err(e) => {
                    tracing::warn!(
                        world,
                        map = %map.name,
                        range = %range.name,
                        error = %e,
                        "子区域渲染失败"
                    );
                    failed_ranges.push(range.name.clone());
                }
            }
        }

        let base = base_invocation(target, &config.defaults, map);
        if let Err(e) = self.renderer.render(&base).await {
            tracing::error!(world, map = %map.name, error = %e, "基础渲染失败");
            return MapOutcome::Failed(e);
        }

        let mut max_zoom_patched = None;
        if let Some(deepest) = deepest_range_zoom
            && deepest > map_zoom.zoom_in
        {
            match patch_max_zoom(&output, deepest) {
                Ok(_) => {
                    tracing::debug!(world, map = %map.name, max_zoom = deepest, "已修补 maxZoom");
                    max_zoom_patched = Some(deepest);
                }
                Err(e) => tracing::warn!(world, map = %map.name, error = %e, "修补 maxZoom 失败"),
            }
        }

        let manifest = Manifest::rendered_now(
            world,
            &map.name,
            map.dimension.as_str(),
            Some(format!("{world}/{}", map.output_subdir())),
        );
        if let Err(e) = manifest.write(&manifest_path) {
            let e = RenderError::Manifest {
                path: manifest_path,
                message: e.to_string(),
            };
            tracing::error!(world, map = %map.name, error = %e, "写入地图清单失败");
            return MapOutcome::Failed(e);
        }

        tracing::info!(world, map = %map.name, "地图渲染完成");
        MapOutcome::Rendered {
            failed_ranges,
            max_zoom_patched,
        }
    }
}
