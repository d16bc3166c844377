/// 启动检查工具模块
pub mod checks;

pub use checks::{StartupRequirements, run_startup_checks};
