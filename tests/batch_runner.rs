mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mapctl::AppError;
use mapctl::features::maps::{BatchMode, BuildOptions, run_batch, run_batch_outcomes};

use common::{Fixture, make_world};

const CONFIG: &str = r#"
maps:
  - name: overworld
    dimension: overworld
"#;

fn three_worlds(fx: &Fixture) -> Vec<String> {
    make_world(&fx.worlds_dir, "a", Some(CONFIG), &["overworld"]);
    make_world(&fx.worlds_dir, "b", None, &["overworld"]);
    make_world(&fx.worlds_dir, "c", Some(CONFIG), &["overworld"]);
    vec!["a".to_string(), "b".to_string(), "c".to_string()]
}

async fn build_all(fx: &Fixture, mode: BatchMode) -> Result<(), AppError> {
    let builder = Arc::new(fx.builder());
    let worlds = three_worlds(fx);
    run_batch(worlds, mode, move |world| {
        let builder = Arc::clone(&builder);
        async move {
            builder.build(&world, &BuildOptions::default()).await?;
            Ok(())
        }
    })
    .await
}

#[tokio::test]
async fn sequential_batch_attempts_every_world() {
    let fx = Fixture::new("batch-seq");

    let err = build_all(&fx, BatchMode::Sequential).await.unwrap_err();

    assert!(matches!(&err, AppError::Config(msg) if msg.contains("map-config.yml not found")));
    assert!(fx.maps_dir.join("a/overworld/manifest.json").is_file());
    assert!(fx.maps_dir.join("c/overworld/manifest.json").is_file());
    assert!(!fx.maps_dir.join("b").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_batch_attempts_every_world() {
    let fx = Fixture::new("batch-par");

    let err = build_all(&fx, BatchMode::Parallel { max_workers: 2 })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
    assert!(fx.maps_dir.join("a/overworld/manifest.json").is_file());
    assert!(fx.maps_dir.join("c/overworld/manifest.json").is_file());
}

#[tokio::test]
async fn all_worlds_succeeding_returns_ok() {
    let fx = Fixture::new("batch-ok");
    make_world(&fx.worlds_dir, "a", Some(CONFIG), &["overworld"]);
    make_world(&fx.worlds_dir, "c", Some(CONFIG), &["overworld"]);
    let builder = Arc::new(fx.builder());

    let result = run_batch(
        vec!["a".to_string(), "c".to_string()],
        BatchMode::Parallel { max_workers: 0 },
        move |world| {
            let builder = Arc::clone(&builder);
            async move {
                builder.build(&world, &BuildOptions::default()).await?;
                Ok(())
            }
        },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(fx.renderer.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_batch_respects_worker_limit() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let worlds: Vec<String> = (0..8).map(|i| format!("w{i}")).collect();

    let (job_running, job_peak) = (Arc::clone(&running), Arc::clone(&peak));
    let outcomes = run_batch_outcomes(worlds, BatchMode::Parallel { max_workers: 3 }, move |_| {
        let running = Arc::clone(&job_running);
        let peak = Arc::clone(&job_peak);
        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await;

    assert_eq!(outcomes.len(), 8);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_error_follows_world_order_not_completion_order() {
    let worlds = vec!["slow".to_string(), "fast".to_string(), "fine".to_string()];

    let err = run_batch(worlds, BatchMode::Parallel { max_workers: 3 }, |world| async move {
        match world.as_str() {
            "slow" => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Err(AppError::World("slow failed".to_string()))
            }
            "fast" => Err(AppError::World("fast failed".to_string())),
            _ => Ok(()),
        }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::World(msg) if msg == "slow failed"));
}

#[tokio::test]
async fn outcomes_keep_input_order() {
    let worlds = vec!["x".to_string(), "y".to_string(), "z".to_string()];

    let outcomes = run_batch_outcomes(worlds, BatchMode::Sequential, |world| async move {
        if world == "y" {
            Err(AppError::Validation("bad".to_string()))
        } else {
            Ok(())
        }
    })
    .await;

    let names: Vec<&str> = outcomes.iter().map(|(w, _)| w.as_str()).collect();
    assert_eq!(names, ["x", "y", "z"]);
    assert!(outcomes[0].1.is_ok());
    assert!(outcomes[1].1.is_err());
    assert!(outcomes[2].1.is_ok());
}
