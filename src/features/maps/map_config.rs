//! 每个世界的 `map-config.yml`
//!
//! ```yaml
//! defaults: { zoomout: 2, zoomin: 1, imageformat: jpeg, chunkprocessors: 2 }
//! maps:
//!   - name: overworld
//!     dimension: overworld
//!     options: { shadows: 3d, topY: 120 }
//!     ranges:
//!       - { name: spawn_area, center: [0, 0], radius: 2048, zoomin: 2 }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::features::worlds::store::MAP_CONFIG_FILE;

/// 支持的输出图片格式
const IMAGE_FORMATS: [&str; 3] = ["jpeg", "png", "webp"];

/// 维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DimensionRepr", into = "String")]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

/// YAML 中维度既可以写名字，也可以写旧式编号（0 / -1 / 1）
#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Id(i64),
    Name(String),
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Overworld => "overworld",
            Dimension::Nether => "nether",
            Dimension::End => "end",
        }
    }

    /// 该维度在存档目录中的位置
    pub fn data_dir(self, world_data_dir: &Path) -> PathBuf {
        match self {
            Dimension::Overworld => world_data_dir.to_path_buf(),
            Dimension::Nether => world_data_dir.join("DIM-1"),
            Dimension::End => world_data_dir.join("DIM1"),
        }
    }

    /// 该维度的 region 目录
    pub fn region_dir(self, world_data_dir: &Path) -> PathBuf {
        self.data_dir(world_data_dir).join("region")
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overworld" | "0" => Ok(Dimension::Overworld),
            "nether" | "-1" => Ok(Dimension::Nether),
            "end" | "1" => Ok(Dimension::End),
            other => Err(format!(
                "无效的维度 '{other}'（可选 overworld / nether / end）"
            )),
        }
    }
}

impl TryFrom<DimensionRepr> for Dimension {
    type Error = String;

    fn try_from(value: DimensionRepr) -> Result<Self, Self::Error> {
        match value {
            DimensionRepr::Id(id) => id.to_string().parse(),
            DimensionRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Dimension> for String {
    fn from(value: Dimension) -> Self {
        value.as_str().to_string()
    }
}

/// 阴影模式
///
/// YAML 中可写布尔值，也可写 `true|false|2d|3d|3do` 字符串，两种写法语义一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ShadowsRepr", into = "ShadowsRepr")]
pub enum Shadows {
    On,
    Off,
    TwoD,
    ThreeD,
    ThreeDOutline,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ShadowsRepr {
    Flag(bool),
    Mode(String),
}

impl Shadows {
    /// 传给 `--shadows` 的取值
    pub fn as_flag(self) -> &'static str {
        match self {
            Shadows::On => "true",
            Shadows::Off => "false",
            Shadows::TwoD => "2d",
            Shadows::ThreeD => "3d",
            Shadows::ThreeDOutline => "3do",
        }
    }
}

impl FromStr for Shadows {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Shadows::On),
            "false" => Ok(Shadows::Off),
            "2d" => Ok(Shadows::TwoD),
            "3d" => Ok(Shadows::ThreeD),
            "3do" => Ok(Shadows::ThreeDOutline),
            other => Err(format!(
                "无效的 shadows 取值 '{other}'（可选 true / false / 2d / 3d / 3do）"
            )),
        }
    }
}

impl From<bool> for Shadows {
    fn from(value: bool) -> Self {
        if value { Shadows::On } else { Shadows::Off }
    }
}

impl TryFrom<ShadowsRepr> for Shadows {
    type Error = String;

    fn try_from(value: ShadowsRepr) -> Result<Self, Self::Error> {
        match value {
            ShadowsRepr::Flag(b) => Ok(b.into()),
            ShadowsRepr::Mode(s) => s.parse(),
        }
    }
}

impl From<Shadows> for ShadowsRepr {
    fn from(value: Shadows) -> Self {
        match value {
            Shadows::On => ShadowsRepr::Flag(true),
            Shadows::Off => ShadowsRepr::Flag(false),
            other => ShadowsRepr::Mode(other.as_flag().to_string()),
        }
    }
}

/// 地图默认参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefaults {
    #[serde(default = "MapDefaults::default_zoomout")]
    pub zoomout: i32,
    #[serde(default = "MapDefaults::default_zoomin")]
    pub zoomin: i32,
    #[serde(default = "MapDefaults::default_imageformat")]
    pub imageformat: String,
    #[serde(default = "MapDefaults::default_chunkprocessors")]
    pub chunkprocessors: i32,
}

impl MapDefaults {
    fn default_zoomout() -> i32 {
        2
    }
    fn default_zoomin() -> i32 {
        1
    }
    fn default_imageformat() -> String {
        "jpeg".to_string()
    }
    fn default_chunkprocessors() -> i32 {
        2
    }
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            zoomout: Self::default_zoomout(),
            zoomin: Self::default_zoomin(),
            imageformat: Self::default_imageformat(),
            chunkprocessors: Self::default_chunkprocessors(),
        }
    }
}

/// 渲染选项，未设置的字段不产生任何渲染器参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    #[serde(rename = "topY", default, skip_serializing_if = "Option::is_none")]
    pub top_y: Option<i32>,
    #[serde(rename = "bottomY", default, skip_serializing_if = "Option::is_none")]
    pub bottom_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gndxray: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadows: Option<Shadows>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<bool>,
}

impl MapOptions {
    fn is_empty(&self) -> bool {
        *self == MapOptions::default()
    }
}

/// 生效的缩放级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom {
    pub zoom_out: i32,
    pub zoom_in: i32,
}

/// 方块坐标下的矩形区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x1: i64,
    pub z1: i64,
    pub x2: i64,
    pub z2: i64,
}

impl Area {
    pub fn around(center_x: i64, center_z: i64, radius: i64) -> Self {
        Self {
            x1: center_x - radius,
            z1: center_z - radius,
            x2: center_x + radius,
            z2: center_z + radius,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.z1 >= self.z2
    }

    /// 渲染器的区域表达式
    pub fn to_bounds_expr(&self) -> String {
        format!("b(({},{}),({},{}))", self.x1, self.z1, self.x2, self.z2)
    }
}

/// 子区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRange {
    pub name: String,
    /// `[x, z]`
    pub center: [i32; 2],
    pub radius: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoomout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoomin: Option<i32>,
}

impl MapRange {
    /// 区域覆盖 > 地图已解析的缩放
    pub fn resolved_zoom(&self, map_zoom: Zoom) -> Zoom {
        Zoom {
            zoom_out: self.zoomout.unwrap_or(map_zoom.zoom_out),
            zoom_in: self.zoomin.unwrap_or(map_zoom.zoom_in),
        }
    }

    pub fn area(&self) -> Area {
        Area::around(
            i64::from(self.center[0]),
            i64::from(self.center[1]),
            i64::from(self.radius),
        )
    }
}

/// 单张地图定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    pub dimension: Dimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_subdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoomout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoomin: Option<i32>,
    #[serde(default, skip_serializing_if = "MapOptions::is_empty")]
    pub options: MapOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<MapRange>,
}

impl MapDefinition {
    pub fn new(name: impl Into<String>, dimension: Dimension) -> Self {
        Self {
            name: name.into(),
            dimension,
            output_subdir: None,
            zoomout: None,
            zoomin: None,
            options: MapOptions::default(),
            ranges: Vec::new(),
        }
    }

    /// 输出子目录，未设置时回退到地图名
    pub fn output_subdir(&self) -> &str {
        match self.output_subdir.as_deref() {
            Some(dir) if !dir.is_empty() => dir,
            _ => &self.name,
        }
    }

    /// 地图覆盖 > 默认值
    pub fn resolved_zoom(&self, defaults: &MapDefaults) -> Zoom {
        Zoom {
            zoom_out: self.zoomout.unwrap_or(defaults.zoomout),
            zoom_in: self.zoomin.unwrap_or(defaults.zoomin),
        }
    }
}

/// 世界的地图配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub defaults: MapDefaults,
    #[serde(default)]
    pub maps: Vec<MapDefinition>,
}

impl MapConfig {
    /// 读取 `<world_root>/map-config.yml`
    pub fn load(world_root: &Path) -> Result<Self, AppError> {
        let path = world_root.join(MAP_CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::Config(format!(
                    "map-config.yml not found at {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(AppError::Config(format!("读取 {} 失败: {e}", path.display())));
            }
        };
        Self::parse(&text).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// 保存配置；`path` 可以是目录，也可以是 `.yml`/`.yaml` 文件路径
    pub fn save(&self, path: &Path) -> Result<PathBuf, AppError> {
        let target = if path.is_dir()
            || !matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
            path.join(MAP_CONFIG_FILE)
        } else {
            path.to_path_buf()
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, self.to_yaml()?)?;
        Ok(target)
    }

    pub fn find_map(&self, name: &str) -> Option<&MapDefinition> {
        self.maps.iter().find(|m| m.name == name)
    }

    /// 语义校验，返回全部问题（空表示通过）
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let d = &self.defaults;

        if d.zoomout < 0 {
            problems.push(format!("defaults.zoomout 不能为负数: {}", d.zoomout));
        }
        if d.zoomin < 0 {
            problems.push(format!("defaults.zoomin 不能为负数: {}", d.zoomin));
        }
        if !IMAGE_FORMATS.contains(&d.imageformat.to_ascii_lowercase().as_str()) {
            problems.push(format!(
                "defaults.imageformat 无效 '{}'（可选 jpeg / png / webp）",
                d.imageformat
            ));
        }
        if d.chunkprocessors < 1 {
            problems.push(format!(
                "defaults.chunkprocessors 至少为 1: {}",
                d.chunkprocessors
            ));
        }

        if self.maps.is_empty() {
            problems.push("至少需要定义一张地图".to_string());
        }

        let mut seen_maps = std::collections::HashSet::new();
        for (i, map) in self.maps.iter().enumerate() {
            let at = format!("maps[{i}]");
            if map.name.trim().is_empty() {
                problems.push(format!("{at}.name 不能为空"));
            } else if !seen_maps.insert(map.name.as_str()) {
                problems.push(format!("{at}.name 重复: {}", map.name));
            }
            check_zoom(&mut problems, &at, map.zoomout, map.zoomin);

            let mut seen_ranges = std::collections::HashSet::new();
            for (j, range) in map.ranges.iter().enumerate() {
                let at = format!("{at}.ranges[{j}]");
                if range.name.trim().is_empty() {
                    problems.push(format!("{at}.name 不能为空"));
                } else if !seen_ranges.insert(range.name.as_str()) {
                    problems.push(format!("{at}.name 重复: {}", range.name));
                }
                if range.radius <= 0 {
                    problems.push(format!("{at}.radius 必须大于 0: {}", range.radius));
                }
                check_zoom(&mut problems, &at, range.zoomout, range.zoomin);
            }
        }

        problems
    }

    /// 生成默认配置：主世界带出生点附近的放大区域，下界与末地使用 2D 阴影
    pub fn generate_default(spawn_x: i32, spawn_z: i32, radius: i32) -> Self {
        let mut overworld = MapDefinition::new("overworld", Dimension::Overworld);
        overworld.output_subdir = Some("overworld".to_string());
        overworld.options.shadows = Some(Shadows::ThreeD);
        overworld.ranges.push(MapRange {
            name: "spawn_area".to_string(),
            center: [spawn_x, spawn_z],
            radius,
            zoomout: Some(0),
            zoomin: Some(2),
        });

        let mut nether = MapDefinition::new("nether", Dimension::Nether);
        nether.output_subdir = Some("nether".to_string());
        nether.options.top_y = Some(68);
        nether.options.shadows = Some(Shadows::TwoD);
        nether.options.night = Some(false);

        let mut end = MapDefinition::new("end", Dimension::End);
        end.output_subdir = Some("end".to_string());
        end.options.shadows = Some(Shadows::TwoD);
        end.options.night = Some(false);

        Self {
            defaults: MapDefaults {
                zoomout: 6,
                zoomin: 0,
                imageformat: "jpeg".to_string(),
                chunkprocessors: 4,
            },
            maps: vec![overworld, nether, end],
        }
    }
}

fn check_zoom(problems: &mut Vec<String>, at: &str, zoomout: Option<i32>, zoomin: Option<i32>) {
    if let Some(z) = zoomout
        && z < 0
    {
        problems.push(format!("{at}.zoomout 不能为负数: {z}"));
    }
    if let Some(z) = zoomin
        && z < 0
    {
        problems.push(format!("{at}.zoomin 不能为负数: {z}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
maps:
  - name: overworld
    dimension: overworld
    zoomin: 3
    options:
      topY: 120
      shadows: 3d
    ranges:
      - name: spawn
        center: [100, -50]
        radius: 256
        zoomin: 5
  - name: nether
    dimension: -1
    output_subdir: under
    options:
      shadows: true
"#;

    #[test]
    fn parse_applies_defaults_and_aliases() {
        let cfg = MapConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.defaults, MapDefaults::default());
        assert_eq!(cfg.maps[0].options.top_y, Some(120));
        assert_eq!(cfg.maps[0].options.shadows, Some(Shadows::ThreeD));
        assert_eq!(cfg.maps[1].dimension, Dimension::Nether);
        assert_eq!(cfg.maps[1].options.shadows, Some(Shadows::On));
        assert_eq!(cfg.maps[0].output_subdir(), "overworld");
        assert_eq!(cfg.maps[1].output_subdir(), "under");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn shadows_bool_and_string_are_equivalent() {
        let from_bool: MapOptions = serde_yaml::from_str("shadows: false").unwrap();
        let from_str: MapOptions = serde_yaml::from_str("shadows: \"false\"").unwrap();
        assert_eq!(from_bool.shadows, from_str.shadows);
        assert_eq!(from_bool.shadows.unwrap().as_flag(), "false");
        assert!(serde_yaml::from_str::<MapOptions>("shadows: 4d").is_err());
    }

    #[test]
    fn zoom_precedence_range_over_map_over_defaults() {
        let cfg = MapConfig::parse(SAMPLE).unwrap();
        let map = &cfg.maps[0];
        let map_zoom = map.resolved_zoom(&cfg.defaults);
        assert_eq!(map_zoom, Zoom { zoom_out: 2, zoom_in: 3 });
        assert_eq!(
            map.ranges[0].resolved_zoom(map_zoom),
            Zoom { zoom_out: 2, zoom_in: 5 }
        );
        assert_eq!(
            cfg.maps[1].resolved_zoom(&cfg.defaults),
            Zoom { zoom_out: 2, zoom_in: 1 }
        );
    }

    #[test]
    fn range_area_and_bounds_expr() {
        let cfg = MapConfig::parse(SAMPLE).unwrap();
        let area = cfg.maps[0].ranges[0].area();
        assert_eq!(area.to_bounds_expr(), "b((-156,-306),(356,206))");
        assert!(!area.is_degenerate());
        assert!(Area::around(0, 0, 0).is_degenerate());
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut cfg = MapConfig::parse(SAMPLE).unwrap();
        cfg.defaults.imageformat = "gif".to_string();
        cfg.defaults.chunkprocessors = 0;
        cfg.maps[0].ranges[0].radius = 0;
        cfg.maps[1].name = "overworld".to_string();
        let problems = cfg.validate();
        assert_eq!(problems.len(), 4, "{problems:?}");

        assert!(!MapConfig::default().validate().is_empty());
    }

    #[test]
    fn generated_config_round_trips_through_yaml() {
        let cfg = MapConfig::generate_default(12, -34, 2048);
        assert!(cfg.validate().is_empty());
        let yaml = cfg.to_yaml().unwrap();
        assert!(yaml.contains("spawn_area"));
        assert_eq!(MapConfig::parse(&yaml).unwrap(), cfg);
    }
}
