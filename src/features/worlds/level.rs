use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::AppError;

use super::models::{LevelDat, LevelInfo};

/// 读取并解码 gzip 压缩的 level.dat
pub fn read_level_dat(path: &Path) -> Result<LevelInfo, AppError> {
    let raw = std::fs::read(path)
        .map_err(|e| AppError::World(format!("读取 {} 失败: {e}", path.display())))?;

    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut nbt = Vec::new();
    decoder
        .read_to_end(&mut nbt)
        .map_err(|e| AppError::World(format!("解压 {} 失败: {e}", path.display())))?;

    let level: LevelDat = fastnbt::from_bytes(&nbt)
        .map_err(|e| AppError::World(format!("解析 {} 失败: {e}", path.display())))?;
    Ok(level.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::worlds::models::VersionTag;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    #[test]
    fn decodes_gzip_nbt() {
        let dir = std::env::temp_dir().join(format!("mapctl-level-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.dat");

        let level = LevelDat {
            data: LevelInfo {
                level_name: "survival".to_string(),
                version: Some(VersionTag {
                    id: 3700,
                    name: "1.20.5".to_string(),
                    snapshot: 0,
                }),
                data_version: Some(3700),
                spawn_x: -120,
                spawn_y: 64,
                spawn_z: 48,
                last_played: 1_700_000_000_000,
                difficulty: 2,
                game_type: 0,
            },
        };
        let bytes = fastnbt::to_bytes(&level).unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&bytes).unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        let decoded = read_level_dat(&path).unwrap();
        assert_eq!(decoded.spawn_x, -120);
        assert_eq!(decoded.spawn_z, 48);
        assert_eq!(decoded.difficulty_name(), "Normal");
        assert_eq!(decoded.version_name(), "1.20.5");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_is_a_world_error() {
        let dir = std::env::temp_dir().join(format!("mapctl-level-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.dat");
        std::fs::write(&path, b"not gzip").unwrap();

        assert!(matches!(read_level_dat(&path), Err(AppError::World(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
