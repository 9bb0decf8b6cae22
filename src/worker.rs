use serde_json::json;
use tokio::sync::watch;

use crate::db;
use crate::destinations::context::ProcessContext;
use crate::state::SharedState;

/// Start a worker pool on a dedicated Tokio runtime with its own thread pool.
/// This runs on a separate OS thread and blocks until shutdown is signaled.
pub fn run_pool(
    state: SharedState,
    shutdown: watch::Receiver<bool>,
    worker_count: usize,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("worker-pool".into())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(worker_count)
                .thread_name("process-worker")
                .enable_all()
                .build()
                .expect("Failed to build worker runtime");

            runtime.block_on(async {
                let mut handles = Vec::with_capacity(worker_count);

                for id in 0..worker_count {
                    handles.push(tokio::spawn(run(id, state.clone(), shutdown.clone())));
                }

                tracing::info!("Submission worker pool started ({worker_count} workers)");

                for handle in handles {
                    let _ = handle.await;
                }

                tracing::info!("Submission worker pool stopped");
            });
        })
        .expect("Failed to spawn worker pool thread")
}

/// A single worker loop that polls the queue and processes items.
async fn run(id: usize, state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!("Worker {id} started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match process_next(&state).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Worker {id} error: {e}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::debug!("Worker {id} stopped");
}

/// How the dispatcher's per-destination failures roll up into the fate of
/// the queue item. `(retryable, message)` per failed destination.
#[derive(Debug, PartialEq)]
pub enum TaskOutcome {
    Completed,
    Retry(String),
    Failed(String),
}

pub fn classify_failures(failures: &[(bool, String)]) -> TaskOutcome {
    if failures.is_empty() {
        return TaskOutcome::Completed;
    }
    let message = failures
        .iter()
        .map(|(_, msg)| msg.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    if failures.iter().any(|(retryable, _)| *retryable) {
        TaskOutcome::Retry(message)
    } else {
        TaskOutcome::Failed(message)
    }
}

/// Try to claim and process the next queue item. Returns true if an item was
/// processed.
///
/// Every attachment of the submission's endpoint is treated as an isolated
/// unit of work: one destination's failure never prevents the others from
/// running. Attachments that already delivered this submission (a previous
/// attempt of this at-least-once task) are skipped.
pub async fn process_next(state: &SharedState) -> Result<bool, String> {
    let item = db::process_queue::claim_next(&state.pool)
        .await
        .map_err(|e| format!("Failed to claim queue item: {e}"))?;

    let item = match item {
        Some(item) => item,
        None => return Ok(false),
    };

    tracing::debug!(
        "Processing queue item {} (submission={}, attempt={})",
        item.id,
        item.submission_id,
        item.attempts
    );

    let submission = db::submissions::find_by_id(&state.pool, item.submission_id)
        .await
        .map_err(|e| format!("Failed to load submission: {e}"))?;

    let submission = match submission {
        Some(s) => s,
        None => {
            let error = format!("Submission {} not found", item.submission_id);
            let _ = db::process_queue::mark_failed_permanent(&state.pool, item.id, &error).await;
            return Ok(true);
        }
    };

    let endpoint = db::endpoints::find_by_id(&state.pool, submission.endpoint_id)
        .await
        .map_err(|e| format!("Failed to load endpoint: {e}"))?;

    let endpoint = match endpoint {
        Some(e) => e,
        None => {
            let error = format!("Endpoint {} not found", submission.endpoint_id);
            let _ = db::process_queue::mark_failed_permanent(&state.pool, item.id, &error).await;
            return Ok(true);
        }
    };

    let attachments = db::endpoint_destinations::list_for_endpoint(&state.pool, endpoint.id)
        .await
        .map_err(|e| format!("Failed to load attachments: {e}"))?;

    if attachments.is_empty() {
        let _ = db::process_queue::mark_completed(&state.pool, item.id).await;
        return Ok(true);
    }

    let ctx = ProcessContext {
        submission,
        endpoint,
    };

    let mut failures: Vec<(bool, String)> = Vec::new();

    for (attachment, destination) in attachments {
        let already = db::deliveries::succeeded(&state.pool, attachment.id, item.submission_id)
            .await
            .unwrap_or(false);
        if already {
            continue;
        }

        let Some(variant) = state.destinations.get(&destination.kind) else {
            let error = format!("Unknown destination kind: {}", destination.kind);
            let _ = db::deliveries::create(
                &state.pool,
                attachment.id,
                item.submission_id,
                "failed",
                Some(&json!({ "error": &error })),
            )
            .await;
            failures.push((false, error));
            continue;
        };

        let timeout = std::time::Duration::from_secs(state.config.task_timeout_secs);
        let result = tokio::time::timeout(
            timeout,
            variant.process(&ctx, &destination, &attachment),
        )
        .await;

        match result {
            Ok(Ok(response)) => {
                let _ = db::deliveries::create(
                    &state.pool,
                    attachment.id,
                    item.submission_id,
                    "success",
                    response.as_ref(),
                )
                .await;
            }
            Ok(Err(e)) => {
                let error = e.to_string();
                let _ = db::deliveries::create(
                    &state.pool,
                    attachment.id,
                    item.submission_id,
                    "failed",
                    Some(&json!({ "error": &error })),
                )
                .await;
                if e.disables_destination() {
                    let _ =
                        db::destinations::flag_disabled(&state.pool, destination.id, &error).await;
                }
                tracing::warn!(
                    "Destination {} failed for submission {}: {error}",
                    destination.id,
                    item.submission_id
                );
                failures.push((e.is_retryable(), error));
            }
            Err(_) => {
                // The remote side may still complete a timed-out call, so
                // retries rely on header/metadata writes being idempotent.
                let error = format!(
                    "Destination processing timed out after {}s",
                    state.config.task_timeout_secs
                );
                let _ = db::deliveries::create(
                    &state.pool,
                    attachment.id,
                    item.submission_id,
                    "failed",
                    Some(&json!({ "error": &error })),
                )
                .await;
                failures.push((true, error));
            }
        }
    }

    match classify_failures(&failures) {
        TaskOutcome::Completed => {
            let _ = db::process_queue::mark_completed(&state.pool, item.id).await;
        }
        TaskOutcome::Retry(error) => {
            let _ = db::process_queue::mark_failed(
                &state.pool,
                item.id,
                item.attempts,
                item.max_attempts,
                &error,
            )
            .await;
        }
        TaskOutcome::Failed(error) => {
            let _ = db::process_queue::mark_failed_permanent(&state.pool, item.id, &error).await;
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_failures_completes() {
        assert_eq!(classify_failures(&[]), TaskOutcome::Completed);
    }

    #[test]
    fn any_retryable_failure_retries() {
        let failures = vec![
            (false, "permission revoked".to_string()),
            (true, "rate limited".to_string()),
        ];
        match classify_failures(&failures) {
            TaskOutcome::Retry(msg) => {
                assert!(msg.contains("permission revoked"));
                assert!(msg.contains("rate limited"));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn only_permanent_failures_fail_terminally() {
        let failures = vec![(false, "spreadsheet deleted".to_string())];
        assert_eq!(
            classify_failures(&failures),
            TaskOutcome::Failed("spreadsheet deleted".to_string())
        );
    }
}
