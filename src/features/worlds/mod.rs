pub mod level;
pub mod models;
pub mod store;

pub use level::read_level_dat;
pub use models::{LevelDat, LevelInfo, VersionTag, WorldInfo, difficulty_name};
pub use store::WorldStore;
