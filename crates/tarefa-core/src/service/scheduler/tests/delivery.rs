use super::*;

use crate::queue::RateLimit;

#[test]
fn claim_is_written_before_delivery() {
    let (tx, mut scheduler, _dir) = test_setup();

    send_create_queue(&tx, "email");
    let mut worker_rx = register_worker(&tx, "email", "w1", 8);
    let reply = send_enqueue(&tx, "email", "job");
    scheduler.handle_all_pending();
    let job_id = reply.blocking_recv().unwrap().unwrap();

    worker_rx.try_recv().unwrap();
    let claim_key = crate::storage::keys::claim_key("email", &job_id);
    assert!(scheduler.storage().get_claim(&claim_key).unwrap().is_some());
}

#[test]
fn each_job_is_delivered_to_exactly_one_worker() {
    let (tx, mut scheduler, _dir) = test_setup();

    send_create_queue(&tx, "email");
    let mut rx_a = register_worker(&tx, "email", "w-a", 8);
    let mut rx_b = register_worker(&tx, "email", "w-b", 8);
    for _ in 0..6 {
        let reply = send_enqueue(&tx, "email", "job");
        scheduler.handle_all_pending();
        reply.blocking_recv().unwrap().unwrap();
    }

    let mut seen = std::collections::HashSet::new();
    let mut total = 0;
    for rx in [&mut rx_a, &mut rx_b] {
        while let Ok(job) = rx.try_recv() {
            assert!(seen.insert(job.id), "job delivered twice: {}", job.id);
            total += 1;
        }
    }
    assert_eq!(total, 6);
}

#[test]
fn round_robin_distributes_across_workers() {
    let (tx, mut scheduler, _dir) = test_setup();

    send_create_queue(&tx, "email");
    let mut rx_a = register_worker(&tx, "email", "w-a", 8);
    let mut rx_b = register_worker(&tx, "email", "w-b", 8);
    scheduler.handle_all_pending();

    for _ in 0..4 {
        let reply = send_enqueue(&tx, "email", "job");
        scheduler.handle_all_pending();
        reply.blocking_recv().unwrap().unwrap();
    }

    let count = |rx: &mut tokio::sync::mpsc::Receiver<crate::service::command::ClaimedJob>| {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    };
    assert_eq!(count(&mut rx_a), 2);
    assert_eq!(count(&mut rx_b), 2);
}

#[test]
fn full_worker_channel_rolls_back_the_claim() {
    let (tx, mut scheduler, _dir) = test_setup();

    send_create_queue(&tx, "email");
    let mut worker_rx = register_worker(&tx, "email", "w1", 1);
    let mut job_ids = Vec::new();
    for _ in 0..2 {
        let reply = send_enqueue(&tx, "email", "job");
        scheduler.handle_all_pending();
        job_ids.push(reply.blocking_recv().unwrap().unwrap());
    }

    // Capacity 1: only the first job fits; the second stays waiting, unclaimed
    let delivered = worker_rx.try_recv().unwrap();
    assert!(worker_rx.try_recv().is_err());

    let undelivered = job_ids.iter().find(|id| **id != delivered.id).unwrap();
    let claim_key = crate::storage::keys::claim_key("email", undelivered);
    assert!(scheduler.storage().get_claim(&claim_key).unwrap().is_none());

    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.active, 1);
}

#[test]
fn rate_limit_caps_deliveries_and_leaves_jobs_waiting() {
    let (tx, mut scheduler, _dir) = test_setup();

    let mut config = QueueConfig::new("email");
    config.rate_limit = Some(RateLimit {
        max_jobs: 2,
        window_ms: 60_000,
    });
    send_create_queue_with(&tx, config);
    let mut worker_rx = register_worker(&tx, "email", "w1", 16);
    for _ in 0..5 {
        let reply = send_enqueue(&tx, "email", "job");
        scheduler.handle_all_pending();
        reply.blocking_recv().unwrap().unwrap();
    }

    // Burst of 2 per minute: exactly 2 delivered, the rest stay waiting
    let mut delivered = 0;
    while worker_rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 2);

    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.waiting, 3);
    assert_eq!(stats.active, 2);
}

#[test]
fn no_workers_means_jobs_stay_waiting() {
    let (tx, mut scheduler, _dir) = test_setup();

    send_create_queue(&tx, "email");
    let reply = send_enqueue(&tx, "email", "job");
    scheduler.handle_all_pending();
    let job_id = reply.blocking_recv().unwrap().unwrap();

    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.active, 0);
    let claim_key = crate::storage::keys::claim_key("email", &job_id);
    assert!(scheduler.storage().get_claim(&claim_key).unwrap().is_none());
}
