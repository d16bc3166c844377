use std::path::Path;

use super::models::Manifest;

/// 地图是否已是最新
///
/// 清单缺失或无法解析时视为过期；否则比较 `last_rendered_epoch >= data_modified_at`。
pub fn is_up_to_date(manifest_path: &Path, data_modified_at: i64) -> bool {
    match Manifest::read(manifest_path) {
        Ok(manifest) => manifest.last_rendered_epoch >= data_modified_at,
        Err(e) => {
            tracing::debug!("清单不可用，按过期处理 {}: {}", manifest_path.display(), e);
            false
        }
    }
}
