#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use flate2::{Compression, write::GzEncoder};
use mapctl::RenderError;
use mapctl::features::maps::render::PROPERTIES_FILE;
use mapctl::features::maps::{MapBuilder, MapRenderer, RenderInvocation, RenderKind};
use mapctl::features::worlds::{LevelDat, LevelInfo, VersionTag, WorldStore};

/// 临时目录（测试结束后由调用方清理）
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mapctl-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_level_dat(path: &Path, spawn_x: i32, spawn_z: i32) {
    let level = LevelDat {
        data: LevelInfo {
            level_name: "test".to_string(),
            version: Some(VersionTag {
                id: 3953,
                name: "1.21".to_string(),
                snapshot: 0,
            }),
            data_version: Some(3953),
            spawn_x,
            spawn_y: 70,
            spawn_z,
            last_played: 1_700_000_000_000,
            difficulty: 3,
            game_type: 0,
        },
    };
    let nbt = fastnbt::to_bytes(&level).unwrap();
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&nbt).unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, enc.finish().unwrap()).unwrap();
}

/// 把 level.dat 的修改时间设为 `secs` 秒之后（负数为之前）
pub fn shift_level_mtime(worlds_dir: &Path, world: &str, secs: i64) {
    let path = worlds_dir.join(world).join("world").join("level.dat");
    let now = SystemTime::now();
    let at = if secs >= 0 {
        now + Duration::from_secs(secs as u64)
    } else {
        now - Duration::from_secs(secs.unsigned_abs())
    };
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(at).unwrap();
}

/// 创建一个世界：level.dat、各维度 region 目录以及（可选）map-config.yml
pub fn make_world(worlds_dir: &Path, name: &str, map_config: Option<&str>, dims: &[&str]) {
    let root = worlds_dir.join(name);
    let data = root.join("world");
    write_level_dat(&data.join("level.dat"), 100, -200);
    for dim in dims {
        let region = match *dim {
            "overworld" => data.join("region"),
            "nether" => data.join("DIM-1").join("region"),
            "end" => data.join("DIM1").join("region"),
            other => panic!("unknown dimension {other}"),
        };
        std::fs::create_dir_all(&region).unwrap();
    }
    if let Some(yaml) = map_config {
        std::fs::write(root.join("map-config.yml"), yaml).unwrap();
    }
}

/// 记录每次调用的渲染器替身
///
/// 基础渲染会写出带 `maxZoom: <zoomin>` 的视图属性文件，预览渲染会写出 preview.png。
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderInvocation>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让指定 label（`base` / `range:<name>` / `preview`）的调用失败
    pub fn fail_on(&self, label: &str) {
        self.failing.lock().unwrap().insert(label.to_string());
    }

    pub fn calls(&self) -> Vec<RenderInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.label()).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

impl MapRenderer for RecordingRenderer {
    async fn render(&self, invocation: &RenderInvocation) -> Result<(), RenderError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let label = invocation.label();
        if self.failing.lock().unwrap().contains(&label) {
            return Err(RenderError::ExitStatus {
                label,
                code: Some(1),
            });
        }

        match &invocation.kind {
            RenderKind::Base => {
                std::fs::create_dir_all(&invocation.output).unwrap();
                let zoom_in = arg_after(&invocation.args, "--zoomin").unwrap();
                std::fs::write(
                    invocation.output.join(PROPERTIES_FILE),
                    format!(
                        "UnminedMapProperties = {{ minZoom: -2, maxZoom: {zoom_in}, \
                         imageFormat: \"jpeg\" }};\n"
                    ),
                )
                .unwrap();
            }
            RenderKind::Range(_) => {
                std::fs::create_dir_all(&invocation.output).unwrap();
            }
            RenderKind::Preview => {
                std::fs::create_dir_all(invocation.output.parent().unwrap()).unwrap();
                std::fs::write(&invocation.output, b"png").unwrap();
            }
        }
        Ok(())
    }
}

/// 一套临时环境：世界目录、地图目录与记录渲染器
pub struct Fixture {
    pub root: PathBuf,
    pub worlds_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub renderer: RecordingRenderer,
}

impl Fixture {
    pub fn new(tag: &str) -> Self {
        let root = scratch_dir(tag);
        let worlds_dir = root.join("worlds");
        let maps_dir = root.join("maps");
        std::fs::create_dir_all(&worlds_dir).unwrap();
        std::fs::create_dir_all(&maps_dir).unwrap();
        Self {
            root,
            worlds_dir,
            maps_dir,
            renderer: RecordingRenderer::new(),
        }
    }

    pub fn builder(&self) -> MapBuilder<RecordingRenderer> {
        MapBuilder::new(
            WorldStore::new(&self.worlds_dir),
            &self.maps_dir,
            self.renderer.clone(),
        )
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
