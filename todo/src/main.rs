//! Todo demo: load the task list, make a few changes and print a summary.
//!
//! Configure with `TODO_*` environment variables (see [`todo::config`]);
//! `RUST_LOG` overrides `TODO_LOG_LEVEL`.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use taskstore_core::environment::SystemClock;
use todo::{
    CreateTaskInput, LocalStorage, Priority, RemoteStorage, SortDirection, SortField,
    StorageCoordinator, StorageStrategy, Status, TaskEnvironment, TaskFilter, TaskService,
    TaskSort, TimestampIdGenerator, TodoConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TodoConfig::from_env().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let storage = &config.storage;
    tokio::fs::create_dir_all(&storage.local_dir)
        .await
        .with_context(|| format!("cannot create {}", storage.local_dir.display()))?;

    let local = LocalStorage::new(&storage.local_dir)
        .with_key(&storage.local_key)
        .with_quota(storage.local_quota());
    let remote = RemoteStorage::new(storage.remote());
    if let Some(token) = &storage.api_token {
        remote.set_auth_token(token);
    }

    let coordinator = Arc::new(
        StorageCoordinator::new(vec![
            Arc::new(local) as Arc<dyn StorageStrategy>,
            Arc::new(remote) as Arc<dyn StorageStrategy>,
        ])?
        .with_default(storage.strategy)
        .with_auto_switch(storage.auto_switch),
    );
    let active = coordinator.initialize()?;

    let clock = Arc::new(SystemClock);
    let env = TaskEnvironment::new(clock.clone(), Arc::new(TimestampIdGenerator::new(clock)))
        .with_storage(Arc::clone(&coordinator) as Arc<dyn StorageStrategy>);
    let service = TaskService::new(env);

    service.load().await?;
    println!("Loaded {} task(s) from {active} storage", service.tasks().await.len());

    let review = service
        .add_task(CreateTaskInput::new("Review pull requests").with_priority(Priority::High))
        .await?;
    service
        .add_many(vec![
            CreateTaskInput::new("Water the plants").with_priority(Priority::Low),
            CreateTaskInput::new("Plan the sprint"),
        ])
        .await?;
    service.toggle_task(&review.id).await?;

    println!("\nPending, highest priority first:");
    let pending = service
        .view(
            &TaskFilter::all().status(Status::Pending),
            &TaskSort::new(SortField::Priority, SortDirection::Desc),
        )
        .await;
    for task in &pending {
        println!("  [{}] {}", task.priority, task.title);
    }

    let stats = service.stats().await;
    println!(
        "\n{} total, {} completed, {} pending ({}% done)",
        stats.total, stats.completed, stats.pending, stats.completion_rate
    );

    let state = service.state().await;
    println!("Persistence: {:?}", state.persistence);
    println!("Storage: {:?}", coordinator.status());

    service.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
