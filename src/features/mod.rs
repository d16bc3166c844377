/// 地图构建、清单与索引
pub mod maps;
/// 世界元数据（目录布局、level.dat）
pub mod worlds;
