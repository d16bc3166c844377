mod common;

use mapctl::features::maps::{
    BuildOptions, Manifest, ManifestBuilder, ManifestOptions, RenderKind, WorldManifest,
    build_aggregate_index,
};

use common::{Fixture, make_world};

const CONFIG: &str = r#"
maps:
  - name: overworld
    dimension: overworld
  - name: nether
    dimension: nether
    output_subdir: hell
"#;

fn no_previews() -> ManifestOptions {
    ManifestOptions {
        generate_previews: false,
        ..ManifestOptions::default()
    }
}

#[tokio::test]
async fn world_manifest_describes_level_and_maps() {
    let fx = Fixture::new("manifest-world");
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld", "nether"]);
    let manifests = ManifestBuilder::new(fx.builder());

    let manifest = manifests
        .build_world("alpha", &no_previews())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(manifest.world, "alpha");
    assert_eq!(manifest.version, "1.21");
    assert_eq!(manifest.difficulty, 3);
    assert_eq!(manifest.difficulty_name, "Hard");
    assert_eq!(manifest.last_played, "2023-11-14T22:13:20Z");
    let maps: Vec<(&str, &str)> = manifest
        .maps
        .iter()
        .map(|m| (m.name.as_str(), m.dimension.as_str()))
        .collect();
    assert_eq!(maps, [("overworld", "overworld"), ("nether", "nether")]);

    let on_disk = WorldManifest::read(&fx.maps_dir.join("alpha/manifest.json")).unwrap();
    assert_eq!(on_disk, manifest);
    assert!(fx.renderer.calls().is_empty());
}

#[tokio::test]
async fn previews_are_centered_per_dimension() {
    let fx = Fixture::new("manifest-preview");
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld", "nether"]);
    let region = fx.worlds_dir.join("alpha/world/DIM-1/region");
    std::fs::write(region.join("r.0.0.mca"), b"").unwrap();
    std::fs::write(region.join("r.1.0.mca"), b"").unwrap();
    let manifests = ManifestBuilder::new(fx.builder());

    manifests
        .build_world("alpha", &ManifestOptions::default())
        .await
        .unwrap();

    let calls = fx.renderer.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.kind == RenderKind::Preview));
    assert_eq!(calls[0].args[..2], ["image", "render"]);
    // 出生点 (100, -200)
    assert_eq!(calls[0].area(), Some("b((36,-264),(164,-136))"));
    // region 质心 (512, 256)
    assert_eq!(calls[1].area(), Some("b((448,192),(576,320))"));
    assert!(calls[0].args.windows(2).any(|w| w == ["--zoom", "2"]));

    assert!(fx.maps_dir.join("alpha/overworld/preview.png").is_file());
    assert!(fx.maps_dir.join("alpha/hell/preview.png").is_file());
}

#[tokio::test]
async fn preview_failure_does_not_block_world_manifest() {
    let fx = Fixture::new("manifest-preview-fail");
    // 下界 region 目录为空，算不出预览中心
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld", "nether"]);
    fx.renderer.fail_on("preview");
    let manifests = ManifestBuilder::new(fx.builder());

    let manifest = manifests
        .build_world("alpha", &ManifestOptions::default())
        .await
        .unwrap();

    assert!(manifest.is_some());
    assert!(fx.maps_dir.join("alpha/manifest.json").is_file());
}

#[tokio::test]
async fn preview_only_skips_manifests() {
    let fx = Fixture::new("manifest-preview-only");
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld"]);
    let manifests = ManifestBuilder::new(fx.builder());

    let opts = ManifestOptions {
        preview_only: true,
        ..ManifestOptions::default()
    };
    let result = manifests.build_world("alpha", &opts).await.unwrap();

    assert!(result.is_none());
    assert!(!fx.maps_dir.join("alpha/manifest.json").exists());
    assert_eq!(fx.renderer.labels(), vec!["preview"]);
}

#[tokio::test]
async fn stale_map_paths_are_refreshed() {
    let fx = Fixture::new("manifest-path");
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld", "nether"]);
    let builder = fx.builder();
    builder.build("alpha", &BuildOptions::default()).await.unwrap();

    let manifest_path = fx.maps_dir.join("alpha/hell/manifest.json");
    let mut old = Manifest::read(&manifest_path).unwrap();
    assert_eq!(old.path.as_deref(), Some("alpha/hell"));
    old.path = None;
    old.write(&manifest_path).unwrap();

    ManifestBuilder::new(builder)
        .build_world("alpha", &no_previews())
        .await
        .unwrap();

    let refreshed = Manifest::read(&manifest_path).unwrap();
    assert_eq!(refreshed.path.as_deref(), Some("alpha/hell"));
    assert_eq!(refreshed.last_rendered_epoch, old.last_rendered_epoch);
}

#[tokio::test]
async fn aggregate_index_lists_worlds_in_order() {
    let fx = Fixture::new("manifest-index");
    make_world(&fx.worlds_dir, "beta", Some(CONFIG), &["overworld", "nether"]);
    make_world(&fx.worlds_dir, "alpha", Some(CONFIG), &["overworld", "nether"]);
    let manifests = ManifestBuilder::new(fx.builder());
    for world in ["beta", "alpha"] {
        manifests
            .builder()
            .build(world, &BuildOptions::default())
            .await
            .unwrap();
        manifests.build_world(world, &no_previews()).await.unwrap();
    }

    // 无法解析的清单与没有清单的目录都被跳过
    std::fs::create_dir_all(fx.maps_dir.join("broken")).unwrap();
    std::fs::write(fx.maps_dir.join("broken/manifest.json"), "{not json").unwrap();
    std::fs::create_dir_all(fx.maps_dir.join("empty")).unwrap();

    let index = build_aggregate_index(&fx.maps_dir).unwrap();

    let names: Vec<&str> = index.worlds.iter().map(|w| w.world.as_str()).collect();
    assert_eq!(names, ["alpha", "beta"]);

    let json: Vec<WorldManifest> =
        serde_json::from_str(&std::fs::read_to_string(&index.json_path).unwrap()).unwrap();
    assert_eq!(json, index.worlds);
    assert!(index.json_path.ends_with("world_manifest.json"));

    let html = std::fs::read_to_string(&index.html_path).unwrap();
    assert!(html.contains("<title>Minecraft Maps</title>"));
    assert!(html.contains(r#"<a href="./alpha/hell/">hell</a>"#));
    assert!(html.contains(r#"<a href="./alpha/overworld/">overworld</a>"#));
    assert!(html.find("./alpha/").unwrap() < html.find("./beta/").unwrap());
    assert!(html.find("./alpha/hell/").unwrap() < html.find("./alpha/overworld/").unwrap());
    assert!(!html.contains("broken"));
    assert!(!html.contains("empty"));
}

#[tokio::test]
async fn aggregate_index_of_empty_maps_dir() {
    let fx = Fixture::new("manifest-index-empty");

    let index = build_aggregate_index(&fx.maps_dir).unwrap();

    assert!(index.worlds.is_empty());
    assert_eq!(std::fs::read_to_string(&index.json_path).unwrap().trim(), "[]");
    assert!(index.html_path.is_file());
}
