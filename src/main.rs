use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use mapctl::config::{AppConfig, parse_duration};
use mapctl::features::maps::field_path::{self, FieldPath, ScalarValue};
use mapctl::features::maps::{
    BatchMode, BuildOptions, LockSettings, ManifestBuilder, ManifestOptions, MapBuilder,
    MapConfig, UnminedCli, build_aggregate_index, run_batch,
};
use mapctl::features::worlds::WorldStore;
use mapctl::startup::{StartupRequirements, run_startup_checks};
use mapctl::{AppError, LockMode, shutdown};

/// 渲染器支持的日志级别
const RENDERER_LOG_LEVELS: [&str; 6] = [
    "verbose",
    "debug",
    "information",
    "warning",
    "error",
    "fatal",
];

#[derive(Parser, Debug)]
#[command(name = "mapctl", version, about = "Minecraft 世界地图构建工具（uNmINeD）")]
struct Cli {
    /// 配置文件路径（默认 $MAPCTL_CONFIG 或 /etc/mapctl.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 渲染世界地图（支持通配符，如 `survival-*`）
    Build(BuildArgs),
    /// 生成预览图与世界清单
    Manifest(ManifestArgs),
    /// 重新生成 world_manifest.json 与 index.html
    Index,
    /// 为单张地图生成预览图
    Preview(PreviewArgs),
    /// 查看或修改 map-config.yml
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// 列出全部世界
    Worlds,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// 并行处理多个世界
    #[arg(long)]
    parallel: bool,
    /// 最大并发世界数（0 为 CPU 核心数，默认取配置）
    #[arg(long)]
    max_workers: Option<usize>,
}

impl BatchArgs {
    fn mode(&self, config: &AppConfig) -> BatchMode {
        BatchMode::new(
            self.parallel,
            self.max_workers.unwrap_or_else(|| config.max_workers()),
        )
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// 世界名或通配模式
    #[arg(required = true)]
    worlds: Vec<String>,
    /// 只构建指定地图
    #[arg(long)]
    map: Option<String>,
    /// 忽略清单强制重新渲染
    #[arg(long)]
    force: bool,
    /// 锁文件路径
    #[arg(long)]
    lock_file: Option<PathBuf>,
    /// 等待锁的超时，如 30s、5m（默认一直等待）
    #[arg(long, value_parser = parse_duration)]
    lock_timeout: Option<Duration>,
    /// 不加锁
    #[arg(long, conflicts_with_all = ["lock_file", "lock_timeout", "non_blocking"])]
    no_lock: bool,
    /// 锁被占用时直接跳过
    #[arg(long)]
    non_blocking: bool,
    #[command(flatten)]
    batch: BatchArgs,
    /// 渲染器日志级别
    #[arg(long, value_parser = RENDERER_LOG_LEVELS)]
    log_level: Option<String>,
}

#[derive(Args, Debug)]
struct ManifestArgs {
    /// 世界名或通配模式
    #[arg(required = true)]
    worlds: Vec<String>,
    /// 不生成预览图
    #[arg(long, conflicts_with = "preview_only")]
    no_preview: bool,
    /// 只生成预览图
    #[arg(long)]
    preview_only: bool,
    /// 完成后重新生成汇总索引
    #[arg(long)]
    update_index: bool,
    #[command(flatten)]
    batch: BatchArgs,
    /// 渲染器日志级别
    #[arg(long, value_parser = RENDERER_LOG_LEVELS)]
    log_level: Option<String>,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    world: String,
    map: String,
    /// 渲染器日志级别
    #[arg(long, value_parser = RENDERER_LOG_LEVELS)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// 读取字段（省略路径时输出整个配置）
    Get {
        world: String,
        /// 字段路径，如 maps[0].options.shadows
        path: Option<String>,
        /// 输出格式
        #[arg(long, default_value = "yaml", value_parser = ["yaml", "json"])]
        format: String,
    },
    /// 修改字段
    Set {
        world: String,
        path: String,
        value: String,
    },
    /// 校验配置
    Validate { world: String },
    /// 按出生点生成默认配置
    Generate {
        world: String,
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
        /// 出生点放大区域半径
        #[arg(long, default_value_t = 2048)]
        radius: i32,
        /// 输出路径（默认 <世界目录>/map-config.yml）
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::init_global(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置加载失败: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config);

    let run = run(cli.command, config);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        reason = shutdown::wait_for_termination() => match reason {
            Ok(reason) => {
                tracing::warn!("收到终止信号，退出: {:?}", reason);
                std::process::exit(reason.exit_code());
            }
            Err(e) => {
                tracing::warn!("{}", e);
                run.await
            }
        },
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mapctl={}", config.logging.level).into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.init();
    }
}

async fn run(command: Command, config: &'static AppConfig) -> Result<(), AppError> {
    match command {
        Command::Build(args) => cmd_build(args, config).await,
        Command::Manifest(args) => cmd_manifest(args, config).await,
        Command::Index => cmd_index(config),
        Command::Preview(args) => cmd_preview(args, config).await,
        Command::Config { action } => cmd_config(action, config),
        Command::Worlds => cmd_worlds(config),
    }
}

fn map_builder(config: &AppConfig) -> MapBuilder<UnminedCli> {
    MapBuilder::new(
        WorldStore::new(config.worlds_dir()),
        config.maps_dir(),
        UnminedCli::new(config.renderer_binary()),
    )
}

fn renderer_log_level(arg: Option<String>, config: &AppConfig) -> String {
    arg.unwrap_or_else(|| config.renderer.log_level.clone())
}

async fn cmd_build(args: BuildArgs, config: &AppConfig) -> Result<(), AppError> {
    run_startup_checks(
        config,
        StartupRequirements {
            renderer: true,
            maps_dir: true,
        },
    )?;

    let builder = Arc::new(map_builder(config));
    let worlds = builder.worlds().expand_patterns(&args.worlds)?;
    let mode = args.batch.mode(config);

    let lock = (!args.no_lock).then(|| LockSettings {
        path: args.lock_file.clone().unwrap_or_else(|| config.lock_path()),
        mode: LockMode::from_flags(
            args.non_blocking,
            args.lock_timeout.or_else(|| config.lock_timeout()),
        ),
    });
    let opts = BuildOptions {
        map: args.map,
        force: args.force,
        lock,
        log_level: renderer_log_level(args.log_level, config),
    };

    if let [world] = worlds.as_slice()
        && mode == BatchMode::Sequential
    {
        builder.build(world, &opts).await?;
        return Ok(());
    }

    let opts = Arc::new(opts);
    run_batch(worlds, mode, move |world| {
        let builder = Arc::clone(&builder);
        let opts = Arc::clone(&opts);
        async move { builder.build(&world, &opts).await.map(|_| ()) }
    })
    .await
}

async fn cmd_manifest(args: ManifestArgs, config: &AppConfig) -> Result<(), AppError> {
    run_startup_checks(
        config,
        StartupRequirements {
            renderer: !args.no_preview,
            maps_dir: true,
        },
    )?;

    let manifests = Arc::new(ManifestBuilder::new(map_builder(config)));
    let worlds = manifests.builder().worlds().expand_patterns(&args.worlds)?;
    let opts = Arc::new(ManifestOptions {
        generate_previews: !args.no_preview,
        preview_only: args.preview_only,
        log_level: renderer_log_level(args.log_level, config),
    });

    let job_manifests = Arc::clone(&manifests);
    let result = run_batch(worlds, args.batch.mode(config), move |world| {
        let manifests = Arc::clone(&job_manifests);
        let opts = Arc::clone(&opts);
        async move { manifests.build_world(&world, &opts).await.map(|_| ()) }
    })
    .await;

    if args.update_index {
        match build_aggregate_index(manifests.builder().maps_dir()) {
            Ok(index) => println!("{}", index.html_path.display()),
            Err(e) if result.is_ok() => return Err(e),
            Err(e) => tracing::error!("{}", e),
        }
    }
    result
}

fn cmd_index(config: &AppConfig) -> Result<(), AppError> {
    run_startup_checks(
        config,
        StartupRequirements {
            renderer: false,
            maps_dir: true,
        },
    )?;
    let index = build_aggregate_index(&config.maps_dir())?;
    println!("{}", index.json_path.display());
    println!("{}", index.html_path.display());
    Ok(())
}

async fn cmd_preview(args: PreviewArgs, config: &AppConfig) -> Result<(), AppError> {
    run_startup_checks(
        config,
        StartupRequirements {
            renderer: true,
            maps_dir: true,
        },
    )?;
    let builder = map_builder(config);
    require_world(builder.worlds(), &args.world)?;
    let output = builder
        .generate_preview(
            &args.world,
            &args.map,
            &renderer_log_level(args.log_level, config),
        )
        .await?;
    println!("{}", output.display());
    Ok(())
}

fn cmd_config(action: ConfigCommand, config: &AppConfig) -> Result<(), AppError> {
    let store = WorldStore::new(config.worlds_dir());

    match action {
        ConfigCommand::Get {
            world,
            path,
            format,
        } => {
            require_world(&store, &world)?;
            let map_config = MapConfig::load(&store.world_root(&world))?;
            let path = FieldPath::parse(path.as_deref().unwrap_or_default())?;
            let value = field_path::get(&map_config, &path)?;
            let text = match (&value, format.as_str()) {
                (serde_yaml::Value::String(s), _) => s.clone(),
                (_, "json") => serde_json::to_string_pretty(&value)?,
                _ => serde_yaml::to_string(&value)?.trim_end().to_string(),
            };
            println!("{text}");
        }
        ConfigCommand::Set { world, path, value } => {
            require_world(&store, &world)?;
            let root = store.world_root(&world);
            let mut map_config = MapConfig::load(&root)?;
            let path = FieldPath::parse(&path)?;
            field_path::set(&mut map_config, &path, ScalarValue::parse(&value))?;

            let problems = map_config.validate();
            if !problems.is_empty() {
                return Err(AppError::Validation(problems.join("; ")));
            }
            let saved = map_config.save(&root)?;
            tracing::info!(world = %world, path = %path, "已更新 {}", saved.display());
        }
        ConfigCommand::Validate { world } => {
            require_world(&store, &world)?;
            let map_config = MapConfig::load(&store.world_root(&world))?;
            let problems = map_config.validate();
            if !problems.is_empty() {
                for p in &problems {
                    println!("✗ {p}");
                }
                return Err(AppError::Validation(format!(
                    "map-config.yml 有 {} 处问题",
                    problems.len()
                )));
            }
            println!("✓ map-config.yml 校验通过（{} 张地图）", map_config.maps.len());
        }
        ConfigCommand::Generate {
            world,
            force,
            radius,
            output,
        } => {
            require_world(&store, &world)?;
            if radius <= 0 {
                return Err(AppError::Validation(format!("radius 必须大于 0: {radius}")));
            }
            let info = store.world_info(&world)?;
            let target = output.unwrap_or_else(|| store.map_config_path(&world));
            let exists = if target.is_dir() {
                target.join(mapctl::features::worlds::store::MAP_CONFIG_FILE).exists()
            } else {
                target.exists()
            };
            if exists && !force {
                return Err(AppError::Validation(format!(
                    "map-config.yml 已存在: {}（使用 --force 覆盖）",
                    target.display()
                )));
            }

            let generated =
                MapConfig::generate_default(info.level.spawn_x, info.level.spawn_z, radius);
            let saved = generated.save(&target)?;
            tracing::info!(
                world = %world,
                spawn_x = info.level.spawn_x,
                spawn_z = info.level.spawn_z,
                radius,
                "已生成 {}",
                saved.display()
            );
        }
    }
    Ok(())
}

fn cmd_worlds(config: &AppConfig) -> Result<(), AppError> {
    let store = WorldStore::new(config.worlds_dir());
    for name in store.list_world_names()? {
        println!("{name}");
    }
    Ok(())
}

fn require_world(store: &WorldStore, name: &str) -> Result<(), AppError> {
    if store.exists(name) {
        Ok(())
    } else {
        Err(AppError::World(format!("world not found: {name}")))
    }
}
