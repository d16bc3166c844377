//! 地图预览图
//!
//! 在出生点（主世界）、原点（末地）或 region 文件质心（下界）附近
//! 渲染一张 128×128 方块的小图。

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, RenderError};

use super::builder::MapBuilder;
use super::map_config::{Area, Dimension, MapConfig};
use super::render::{MapRenderer, RenderTarget, ensure_region_data, preview_invocation};

/// 预览区域半径（方块）
const PREVIEW_RADIUS: i64 = 64;
/// 每个 region 文件覆盖 512×512 方块
const REGION_SPAN: i64 = 512;

static REGION_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^r\.(-?\d+)\.(-?\d+)\.mca$").expect("region 文件名正则无效"));

/// 根据 region 目录中的文件名计算质心（方块坐标）
pub fn region_centroid(region_dir: &Path) -> Result<(i64, i64), RenderError> {
    let entries = std::fs::read_dir(region_dir).map_err(|e| {
        RenderError::PreviewCenter(format!("读取 {} 失败: {e}", region_dir.display()))
    })?;

    let (mut sum_x, mut sum_z, mut count) = (0i64, 0i64, 0i64);
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(caps) = name.to_str().and_then(|n| REGION_FILE_RE.captures(n)) else {
            continue;
        };
        let (Ok(rx), Ok(rz)) = (caps[1].parse::<i64>(), caps[2].parse::<i64>()) else {
            continue;
        };
        // 坐标超出 i64 方块范围的文件名直接忽略
        let next = region_center(rx)
            .zip(region_center(rz))
            .and_then(|(cx, cz)| Some((sum_x.checked_add(cx)?, sum_z.checked_add(cz)?)));
        let Some((x, z)) = next else {
            tracing::debug!("忽略坐标越界的 region 文件: {}", name.to_string_lossy());
            continue;
        };
        (sum_x, sum_z) = (x, z);
        count += 1;
    }

    if count == 0 {
        return Err(RenderError::PreviewCenter(format!(
            "{} 中没有 region 文件",
            region_dir.display()
        )));
    }
    Ok((sum_x / count, sum_z / count))
}

/// region 坐标对应的中心方块坐标
fn region_center(region: i64) -> Option<i64> {
    region.checked_mul(REGION_SPAN)?.checked_add(REGION_SPAN / 2)
}

impl<R: MapRenderer> MapBuilder<R> {
    /// 为一张地图生成 `preview.png`，返回输出路径
    pub async fn generate_preview(
        &self,
        world: &str,
        map_name: &str,
        log_level: &str,
    ) -> Result<PathBuf, AppError> {
        let config = MapConfig::load(&self.worlds().world_root(world))?;
        let map = config.find_map(map_name).ok_or_else(|| {
            AppError::Validation(format!("世界 {world} 的 map-config.yml 中没有地图 {map_name}"))
        })?;

        let world_dir = self.worlds().data_dir(world);
        let region_dir = ensure_region_data(&world_dir, map.dimension)?;

        let (cx, cz) = match map.dimension {
            Dimension::Overworld => {
                let info = self.worlds().world_info(world)?;
                (i64::from(info.level.spawn_x), i64::from(info.level.spawn_z))
            }
            Dimension::End => (0, 0),
            Dimension::Nether => region_centroid(&region_dir)?,
        };

        let output = self.map_output_dir(world, map);
        std::fs::create_dir_all(&output)?;

        let target = RenderTarget {
            world_dir: &world_dir,
            dimension: map.dimension,
            output: &output,
            log_level,
        };
        let invocation = preview_invocation(
            target,
            Area::around(cx, cz, PREVIEW_RADIUS),
            &map.options,
        );
        self.renderer().render(&invocation).await?;

        tracing::info!(world, map = %map_name, center_x = cx, center_z = cz, "预览图已生成");
        Ok(invocation.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_region_files() {
        let dir = std::env::temp_dir().join(format!("mapctl-centroid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let names = [
            "r.0.0.mca",
            "r.-1.0.mca",
            "r.0.-2.mca",
            "r.1.1.mca",
            "notes.txt",
            "r.x.0.mca",
        ];
        for name in names {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        // x: 256, -256, 256, 768 → 256；z: 256, 256, -768, 768 → 128
        assert_eq!(region_centroid(&dir).unwrap(), (256, 128));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_region_names_are_ignored() {
        let dir =
            std::env::temp_dir().join(format!("mapctl-centroid-huge-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let names = [
            "r.2.-1.mca",
            "r.9223372036854775807.0.mca",
            "r.0.-9000000000000000000.mca",
        ];
        for name in names {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        assert_eq!(region_centroid(&dir).unwrap(), (1280, -256));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_region_dir_has_no_center() {
        let dir =
            std::env::temp_dir().join(format!("mapctl-centroid-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            region_centroid(&dir),
            Err(RenderError::PreviewCenter(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
