mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use channel::{ChannelConfig, CorrelationClient, SurrealChannel, SurrealConfig, WorkChannel};
use motion_core::{GenerationResult, JobId, JobStatus};

use common::{origin, refs};

#[tokio::test]
async fn surreal_channel_keeps_push_order() -> Result<(), Box<dyn Error>> {
    let surreal = SurrealChannel::connect(SurrealConfig::memory()).await?;

    let client = CorrelationClient::new(Arc::new(surreal));
    let first = client.submit(refs(&["a.png", "a.mp4"]), "out", &origin("u1")).await?;
    let second = client.submit(refs(&["b.png", "b.mp4"]), "out", &origin("u2")).await?;
    let third = client.submit(refs(&["c.png", "c.mp4"]), "out", &origin("u3")).await?;

    let tasks = client.channel().tasks().await?;
    let ids: Vec<JobId> = tasks.iter().map(|t| t.record.job_id).collect();
    assert_eq!(ids, vec![first, second, third]);
    Ok(())
}

#[tokio::test]
async fn surreal_submit_deduplicates_queued_inputs() -> Result<(), Box<dyn Error>> {
    let surreal = Arc::new(SurrealChannel::connect(SurrealConfig::memory()).await?);
    let client = CorrelationClient::new(surreal.clone());

    let first = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;
    let again = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;
    assert_eq!(first, again);
    assert_eq!(surreal.tasks().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn surreal_result_removal_is_by_key() -> Result<(), Box<dyn Error>> {
    let surreal = SurrealChannel::connect(SurrealConfig::memory()).await?;
    let job_id = JobId::new();

    surreal
        .push_result(GenerationResult::progress(job_id, JobStatus::Processing))
        .await?;
    surreal
        .push_result(GenerationResult::completed(job_id, "out.mp4").with_service_id("gpu-0"))
        .await?;

    let results = surreal.results().await?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].record.status, JobStatus::Processing);
    assert_eq!(results[1].record.service_id.as_deref(), Some("gpu-0"));

    assert!(surreal.remove_result(&results[1].key).await?);
    assert!(!surreal.remove_result(&results[1].key).await?);

    let left = surreal.results().await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].record.status, JobStatus::Processing);
    Ok(())
}

#[tokio::test]
async fn surreal_await_result_finds_worker_record() -> Result<(), Box<dyn Error>> {
    let surreal = Arc::new(SurrealChannel::connect(SurrealConfig::memory()).await?);
    let client =
        CorrelationClient::new(surreal.clone()).with_poll_interval(Duration::from_millis(20));
    let job_id = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;

    surreal.push_result(GenerationResult::failed(job_id, "no gpu")).await?;

    let result = client
        .await_result(job_id, Duration::from_secs(5))
        .await
        .ok_or("expected a result")?;
    assert_eq!(result.error.as_deref(), Some("no gpu"));
    assert!(surreal.results().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn config_rejects_unknown_backend() {
    assert!(ChannelConfig::from_kind("kafka", None, None).is_err());
    assert!(matches!(
        ChannelConfig::from_kind(" Memory ", None, None),
        Ok(ChannelConfig::Memory)
    ));
}

#[tokio::test]
async fn surreal_rejects_invalid_table_names() {
    let mut config = SurrealConfig::memory();
    config.result_table = "results; DROP".to_string();
    assert!(SurrealChannel::connect(config).await.is_err());
}

#[tokio::test]
async fn surreal_endpoint_and_scope_come_from_config() -> Result<(), Box<dyn Error>> {
    let config = ChannelConfig::from_kind("surreal", None, Some("/var/lib/motion".into()))?
        .map_surreal(|c| c.with_namespace("studio").with_database("jobs"));
    let ChannelConfig::Surreal(surreal) = config else {
        return Err("expected a surreal config".into());
    };
    assert_eq!(surreal.endpoint, "file:///var/lib/motion");
    assert!(surreal.is_file());
    assert_eq!((surreal.namespace.as_str(), surreal.database.as_str()), ("studio", "jobs"));

    let remote = SurrealConfig::from_endpoint("ws://db:8000").with_credentials("root", "secret");
    assert!(!remote.is_file());
    assert_eq!(remote.credentials, Some(("root".to_string(), "secret".to_string())));

    // Redis configs pass through untouched.
    let redis = ChannelConfig::from_kind("redis", None, None)?.map_surreal(|c| c.with_database("x"));
    assert!(matches!(redis, ChannelConfig::Redis(_)));
    Ok(())
}

#[tokio::test]
async fn surreal_channel_uses_configured_namespace() -> Result<(), Box<dyn Error>> {
    let config = SurrealConfig::memory()
        .with_namespace("studio")
        .with_database("jobs");
    let surreal = Arc::new(SurrealChannel::connect(config).await?);
    let client = CorrelationClient::new(surreal.clone());

    let job_id = client.submit(refs(&["a.png", "a.mp4"]), "out", &origin("u1")).await?;
    let tasks = surreal.tasks().await?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].record.job_id, job_id);
    Ok(())
}

#[cfg(not(feature = "rocksdb"))]
#[tokio::test]
async fn file_endpoint_requires_rocksdb_feature() {
    let dir = std::env::temp_dir().join("motion-channel-no-rocksdb");
    let result = SurrealChannel::connect(SurrealConfig::file(dir.to_string_lossy())).await;
    assert!(matches!(result, Err(channel::ChannelError::InvalidConfig(_))));
}
