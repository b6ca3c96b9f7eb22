mod common;

use std::error::Error;
use std::time::Duration;

use channel::{ChannelError, PollEvent, PollState, WorkChannel};
use motion_core::{GenerationResult, JobId, JobStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{POLL, memory_client, origin, push_result_after, refs};

#[tokio::test]
async fn submit_reuses_id_of_queued_job_with_same_inputs() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();

    let first = client
        .submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1"))
        .await?;
    assert_eq!(memory.task_count().await, 1);

    let second = client
        .submit(refs(&["a.png", "b.mp4"]), "out", &origin("u2"))
        .await?;
    assert_eq!(second, first);
    assert_eq!(memory.task_count().await, 1);

    Ok(())
}

#[tokio::test]
async fn submit_pushes_new_job_when_inputs_differ() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();

    let first = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;
    // Same files in a different order are different inputs.
    let second = client.submit(refs(&["b.mp4", "a.png"]), "out", &origin("u1")).await?;
    assert_ne!(first, second);
    assert_eq!(memory.task_count().await, 2);

    let tasks = client.channel().tasks().await?;
    assert_eq!(tasks[0].record.job_id, first);
    assert_eq!(tasks[1].record.job_id, second);
    assert_eq!(tasks[1].record.origin_id, origin("u1"));

    Ok(())
}

#[tokio::test]
async fn submit_pushes_again_once_worker_took_the_job() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();

    let first = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;
    let taken = memory.take_task().await.ok_or("task missing")?;
    assert_eq!(taken.job_id, first);

    let second = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;
    assert_ne!(first, second);

    Ok(())
}

#[tokio::test]
async fn submit_fails_when_task_channel_unreachable() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    memory.set_offline(true);

    let result = client.submit(refs(&["a.png"]), "out", &origin("u1")).await;
    assert!(matches!(result, Err(ChannelError::Unavailable(_))));

    memory.set_offline(false);
    assert_eq!(memory.task_count().await, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn await_result_returns_none_within_timeout_plus_interval() -> Result<(), Box<dyn Error>> {
    let (_memory, client) = memory_client();
    let timeout = Duration::from_secs(5);

    let started = Instant::now();
    let result = client.await_result(JobId::new(), timeout).await;

    assert!(result.is_none());
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout, "returned early after {elapsed:?}");
    assert!(elapsed <= timeout + POLL, "returned late after {elapsed:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn await_result_consumes_terminal_result() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let job_id = client.submit(refs(&["a.png", "b.mp4"]), "out", &origin("u1")).await?;

    push_result_after(
        &memory,
        Duration::from_secs(3),
        GenerationResult::completed(job_id, "out/video.mp4"),
    );

    let result = client
        .await_result(job_id, Duration::from_secs(30))
        .await
        .ok_or("expected a result")?;
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.output_path.as_deref(), Some("out/video.mp4"));
    assert_eq!(memory.result_count().await, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn await_result_ignores_other_jobs() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let ours = JobId::new();
    let theirs = JobId::new();

    memory.push_result(GenerationResult::failed(theirs, "boom")).await;
    push_result_after(&memory, Duration::from_secs(2), GenerationResult::failed(ours, "bad input"));

    let result = client
        .await_result(ours, Duration::from_secs(10))
        .await
        .ok_or("expected a result")?;
    assert_eq!(result.job_id, ours);
    assert_eq!(result.error.as_deref(), Some("bad input"));

    let left = client.channel().results().await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].record.job_id, theirs);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_waits_until_result_arrives() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let job_id = JobId::new();

    push_result_after(
        &memory,
        Duration::from_secs(120),
        GenerationResult::completed(job_id, "late.mp4"),
    );

    let result = client.await_result(job_id, Duration::ZERO).await;
    assert!(result.is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn poller_reports_each_status_change_once() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let job_id = JobId::new();
    let mut poller = client.poll(job_id, Duration::from_secs(60));
    assert_eq!(poller.state(), &PollState::Submitted);

    memory.push_result(GenerationResult::progress(job_id, JobStatus::Queued)).await;
    assert_eq!(poller.next().await, PollEvent::Progress(JobStatus::Queued));

    memory.push_result(GenerationResult::progress(job_id, JobStatus::Queued)).await;
    memory.push_result(GenerationResult::progress(job_id, JobStatus::Processing)).await;
    assert_eq!(poller.next().await, PollEvent::Progress(JobStatus::Processing));
    assert_eq!(
        poller.state(),
        &PollState::Polling {
            last_status: Some(JobStatus::Processing)
        }
    );

    let done = GenerationResult::completed(job_id, "done.mp4");
    memory.push_result(done.clone()).await;
    assert_eq!(poller.next().await, PollEvent::Finished(done.clone()));
    assert_eq!(poller.state(), &PollState::Terminal(PollEvent::Finished(done)));

    // Progress records are observed, never consumed.
    assert_eq!(memory.result_count().await, 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn poller_prefers_terminal_entry_over_later_progress() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let job_id = JobId::new();

    memory.push_result(GenerationResult::failed(job_id, "oom")).await;
    memory.push_result(GenerationResult::progress(job_id, JobStatus::Processing)).await;

    let mut poller = client.poll(job_id, Duration::from_secs(10));
    let event = poller.next().await;
    assert_eq!(event, PollEvent::Finished(GenerationResult::failed(job_id, "oom")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn polling_survives_transient_channel_errors() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    let job_id = JobId::new();
    memory.set_offline(true);

    let recovering = memory.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        recovering.set_offline(false);
        recovering
            .push_result(GenerationResult::completed(job_id, "ok.mp4"))
            .await;
    });

    let result = client.await_result(job_id, Duration::from_secs(20)).await;
    assert_eq!(result.and_then(|r| r.output_path).as_deref(), Some("ok.mp4"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn channel_errors_count_against_timeout() -> Result<(), Box<dyn Error>> {
    let (memory, client) = memory_client();
    memory.set_offline(true);

    let started = Instant::now();
    let result = client.await_result(JobId::new(), Duration::from_secs(4)).await;
    assert!(result.is_none());
    assert!(started.elapsed() <= Duration::from_secs(4) + POLL);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_waiting() -> Result<(), Box<dyn Error>> {
    let (_memory, client) = memory_client();
    let cancel = CancellationToken::new();
    let client = client.with_cancellation(cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });

    let mut poller = client.poll(JobId::new(), Duration::ZERO);
    assert_eq!(poller.finish_event().await, PollEvent::Cancelled);
    assert!(poller.elapsed() < Duration::from_secs(3));
    Ok(())
}
