//! 多世界批量执行
//!
//! 顺序或并行（信号量限流）对每个世界执行同一个任务。任何世界失败都不阻止
//! 其余世界执行，最终返回按世界顺序的第一个错误。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::AppError;

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Sequential,
    /// 最多同时执行 N 个世界（0 表示取 CPU 核心数）
    Parallel { max_workers: usize },
}

impl BatchMode {
    pub fn new(parallel: bool, max_workers: usize) -> Self {
        if parallel {
            BatchMode::Parallel { max_workers }
        } else {
            BatchMode::Sequential
        }
    }
}

/// 每个世界的执行结果，顺序与输入一致
pub type BatchOutcomes = Vec<(String, Result<(), AppError>)>;

/// 批量执行并返回第一个错误（按世界顺序）
pub async fn run_batch<F, Fut>(worlds: Vec<String>, mode: BatchMode, job: F) -> Result<(), AppError>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    let total = worlds.len();
    let outcomes = run_batch_outcomes(worlds, mode, job).await;
    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        tracing::warn!(total, failed, "批量执行完成，部分世界失败");
    } else {
        tracing::info!(total, "批量执行完成");
    }

    match outcomes.into_iter().find_map(|(_, r)| r.err()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// 批量执行并返回每个世界的结果
pub async fn run_batch_outcomes<F, Fut>(
    worlds: Vec<String>,
    mode: BatchMode,
    job: F,
) -> BatchOutcomes
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    match mode {
        BatchMode::Sequential => run_sequential(worlds, job).await,
        BatchMode::Parallel { max_workers } => run_parallel(worlds, max_workers, job).await,
    }
}

async fn run_sequential<F, Fut>(worlds: Vec<String>, job: F) -> BatchOutcomes
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let mut outcomes = Vec::with_capacity(worlds.len());
    for world in worlds {
        let result = job(world.clone()).await;
        if let Err(e) = &result {
            tracing::error!(world = %world, error = %e, "世界处理失败");
        }
        outcomes.push((world, result));
    }
    outcomes
}

async fn run_parallel<F, Fut>(worlds: Vec<String>, max_workers: usize, job: F) -> BatchOutcomes
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    let workers = effective_workers(max_workers, worlds.len());
    tracing::debug!(worlds = worlds.len(), workers, "并行执行");

    let semaphore = Arc::new(Semaphore::new(workers));
    let job = Arc::new(job);

    let mut handles = Vec::with_capacity(worlds.len());
    for world in &worlds {
        let semaphore = Arc::clone(&semaphore);
        let job = Arc::clone(&job);
        let world = world.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(format!("工作池信号量已关闭: {e}")))?;
            job(world).await
        }));
    }

    // 结果按下标写入预先分配好的槽位
    let mut slots: Vec<Option<Result<(), AppError>>> = (0..worlds.len()).map(|_| None).collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle
            .await
            .unwrap_or_else(|e| Err(AppError::Internal(format!("工作任务异常退出: {e}"))));
        slots[i] = Some(result);
    }

    worlds
        .into_iter()
        .zip(slots)
        .map(|(world, slot)| {
            let result = slot
                .unwrap_or_else(|| Err(AppError::Internal("工作任务没有返回结果".to_string())));
            if let Err(e) = &result {
                tracing::error!(world = %world, error = %e, "世界处理失败");
            }
            (world, result)
        })
        .collect()
}

/// 实际并发数：0 取 CPU 核心数，且不超过世界数量（至少为 1）
pub fn effective_workers(max_workers: usize, world_count: usize) -> usize {
    let requested = if max_workers == 0 {
        num_cpus::get()
    } else {
        max_workers
    };
    requested.min(world_count).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_capped_by_world_count() {
        assert_eq!(effective_workers(8, 3), 3);
        assert_eq!(effective_workers(2, 10), 2);
        assert_eq!(effective_workers(4, 0), 1);
        assert!(effective_workers(0, 1000) >= 1);
        assert_eq!(effective_workers(0, 1), 1);
    }

    #[test]
    fn mode_from_flags() {
        assert_eq!(BatchMode::new(false, 4), BatchMode::Sequential);
        assert_eq!(BatchMode::new(true, 4), BatchMode::Parallel { max_workers: 4 });
    }
}
