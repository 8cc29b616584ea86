use super::*;

use crate::job::FailureInfo;
use crate::service::command::FailOutcome;

/// Helper: create a queue, enqueue one job, and deliver it to a worker.
/// Returns the job id and the worker receiver.
fn claimed_job(
    tx: &crossbeam_channel::Sender<SchedulerCommand>,
    scheduler: &mut Scheduler,
    config: QueueConfig,
) -> (
    Uuid,
    tokio::sync::mpsc::Receiver<crate::service::command::ClaimedJob>,
) {
    let queue = config.name.clone();
    send_create_queue_with(tx, config);
    let mut worker_rx = register_worker(tx, &queue, "w1", 8);
    let reply = send_enqueue(tx, &queue, "job");
    scheduler.handle_all_pending();
    let job_id = reply.blocking_recv().unwrap().unwrap();
    let claimed = worker_rx.try_recv().unwrap();
    assert_eq!(claimed.id, job_id);
    (job_id, worker_rx)
}

#[test]
fn ack_removes_job_and_claim_and_records_completion() {
    let (tx, mut scheduler, _dir) = test_setup();
    let (job_id, _worker_rx) = claimed_job(&tx, &mut scheduler, QueueConfig::new("email"));

    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    scheduler.handle_command(SchedulerCommand::Ack {
        queue: "email".to_string(),
        job_id,
        reply: ack_tx,
    });
    ack_rx.blocking_recv().unwrap().unwrap();

    assert!(scheduler
        .storage()
        .list_jobs(&crate::storage::keys::job_prefix("email"))
        .unwrap()
        .is_empty());
    let claim_key = crate::storage::keys::claim_key("email", &job_id);
    assert!(scheduler.storage().get_claim(&claim_key).unwrap().is_none());

    let completed = scheduler
        .storage()
        .list_completed(&crate::storage::keys::completed_prefix("email"))
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].1.job_id, job_id);
    assert_eq!(completed[0].1.attempts_made, 0);
}

#[test]
fn ack_unknown_job_errors() {
    let (tx, mut scheduler, _dir) = test_setup();
    send_create_queue(&tx, "email");
    scheduler.handle_all_pending();

    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    scheduler.handle_command(SchedulerCommand::Ack {
        queue: "email".to_string(),
        job_id: Uuid::now_v7(),
        reply: ack_tx,
    });
    assert!(matches!(
        ack_rx.blocking_recv().unwrap(),
        Err(crate::error::AckError::JobNotFound(_))
    ));
}

#[test]
fn ack_is_not_idempotent_second_ack_errors() {
    let (tx, mut scheduler, _dir) = test_setup();
    let (job_id, _worker_rx) = claimed_job(&tx, &mut scheduler, QueueConfig::new("email"));

    for expected_ok in [true, false] {
        let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
        scheduler.handle_command(SchedulerCommand::Ack {
            queue: "email".to_string(),
            job_id,
            reply: ack_tx,
        });
        assert_eq!(ack_rx.blocking_recv().unwrap().is_ok(), expected_ok);
    }
}

#[test]
fn fail_increments_attempts_and_schedules_retry() {
    let (tx, mut scheduler, _dir) = test_setup();
    let (job_id, _worker_rx) = claimed_job(&tx, &mut scheduler, QueueConfig::new("email"));

    let (fail_tx, fail_rx) = tokio::sync::oneshot::channel();
    scheduler.handle_command(SchedulerCommand::Fail {
        queue: "email".to_string(),
        job_id,
        error: FailureInfo::with_trace("smtp timeout", "stack trace here"),
        reply: fail_tx,
    });
    let outcome = fail_rx.blocking_recv().unwrap().unwrap();
    // First retry uses the first table entry (1s by default)
    assert_eq!(
        outcome,
        FailOutcome::Retried {
            delay: Duration::from_secs(1),
            attempts_made: 1,
        }
    );

    // Job moved out of the waiting pool into the delayed CF
    assert!(scheduler
        .storage()
        .list_jobs(&crate::storage::keys::job_prefix("email"))
        .unwrap()
        .is_empty());
    let delayed = scheduler.storage().list_delayed().unwrap();
    assert_eq!(delayed.len(), 1);
    let job = &delayed[0].1;
    assert_eq!(job.id, job_id);
    assert_eq!(job.attempts_made, 1);
    let last_error = job.last_error.as_ref().unwrap();
    assert_eq!(last_error.message, "smtp timeout");
    assert_eq!(last_error.trace.as_deref(), Some("stack trace here"));

    // Claim is gone
    let claim_key = crate::storage::keys::claim_key("email", &job_id);
    assert!(scheduler.storage().get_claim(&claim_key).unwrap().is_none());
}

#[test]
fn fail_unknown_job_errors() {
    let (tx, mut scheduler, _dir) = test_setup();
    send_create_queue(&tx, "email");
    scheduler.handle_all_pending();

    let (fail_tx, fail_rx) = tokio::sync::oneshot::channel();
    scheduler.handle_command(SchedulerCommand::Fail {
        queue: "email".to_string(),
        job_id: Uuid::now_v7(),
        error: FailureInfo::new("boom"),
        reply: fail_tx,
    });
    assert!(matches!(
        fail_rx.blocking_recv().unwrap(),
        Err(crate::error::FailError::JobNotFound(_))
    ));
}

#[test]
fn fail_on_unclaimed_job_errors() {
    let (tx, mut scheduler, _dir) = test_setup();
    send_create_queue(&tx, "email");
    // No worker registered: the job stays waiting, unclaimed
    let reply = send_enqueue(&tx, "email", "job");
    scheduler.handle_all_pending();
    let job_id = reply.blocking_recv().unwrap().unwrap();

    let (fail_tx, fail_rx) = tokio::sync::oneshot::channel();
    scheduler.handle_command(SchedulerCommand::Fail {
        queue: "email".to_string(),
        job_id,
        error: FailureInfo::new("boom"),
        reply: fail_tx,
    });
    assert!(matches!(
        fail_rx.blocking_recv().unwrap(),
        Err(crate::error::FailError::JobNotFound(_))
    ));
}
