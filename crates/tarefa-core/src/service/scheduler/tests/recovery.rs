use super::*;

#[test]
fn waiting_jobs_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());

    let (tx, mut scheduler) = test_setup_with_storage(storage.clone());
    send_create_queue(&tx, "email");
    for _ in 0..2 {
        let reply = send_enqueue(&tx, "email", "job");
        scheduler.handle_all_pending();
        reply.blocking_recv().unwrap().unwrap();
    }
    drop(scheduler);
    drop(tx);

    // Restart: a fresh scheduler over the same storage
    let (tx, mut scheduler) = test_setup_with_storage(storage);
    scheduler.recover();

    let mut worker_rx = register_worker(&tx, "email", "w1", 8);
    scheduler.handle_all_pending();

    let mut delivered = 0;
    while worker_rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 2);
}

#[test]
fn queue_configs_are_restored() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());

    let (tx, mut scheduler) = test_setup_with_storage(storage.clone());
    send_create_queue(&tx, "email");
    send_create_queue(&tx, "audit");
    scheduler.handle_all_pending();
    drop(scheduler);
    drop(tx);

    let (_tx, mut scheduler) = test_setup_with_storage(storage);
    scheduler.recover();

    assert!(scheduler.handle_queue_stats("email").is_ok());
    assert!(scheduler.handle_queue_stats("audit").is_ok());
}

#[test]
fn unexpired_claim_is_restored_as_active() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());

    let (tx, mut scheduler) = test_setup_with_storage(storage.clone());
    send_create_queue(&tx, "email");
    let mut worker_rx = register_worker(&tx, "email", "w1", 8);
    let reply = send_enqueue(&tx, "email", "job");
    scheduler.handle_all_pending();
    reply.blocking_recv().unwrap().unwrap();
    worker_rx.try_recv().unwrap();
    drop(scheduler);
    drop(tx);

    let (_tx, mut scheduler) = test_setup_with_storage(storage);
    scheduler.recover();

    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.waiting, 0);
}

#[test]
fn expired_claim_is_reclaimed_on_startup_without_attempt_cost() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());

    let (tx, mut scheduler) = test_setup_with_storage(storage.clone());
    let mut config = QueueConfig::new("email");
    config.claim_timeout_ms = 5;
    send_create_queue_with(&tx, config);
    let mut worker_rx = register_worker(&tx, "email", "w1", 8);
    let reply = send_enqueue(&tx, "email", "job");
    scheduler.handle_all_pending();
    let job_id = reply.blocking_recv().unwrap().unwrap();
    worker_rx.try_recv().unwrap();
    // Simulate a crash while the job was in flight
    drop(scheduler);
    drop(tx);

    std::thread::sleep(Duration::from_millis(15));

    let (_tx, mut scheduler) = test_setup_with_storage(storage);
    scheduler.recover();

    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.active, 0);

    let jobs = scheduler
        .storage()
        .list_jobs(&crate::storage::keys::job_prefix("email"))
        .unwrap();
    assert_eq!(jobs[0].1.id, job_id);
    assert_eq!(jobs[0].1.attempts_made, 0, "a stall is not a failed attempt");
}

#[test]
fn delayed_jobs_survive_a_restart_and_keep_their_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RocksDbStorage::open(dir.path()).unwrap());

    let (tx, mut scheduler) = test_setup_with_storage(storage.clone());
    send_create_queue(&tx, "email");
    let reply = send_enqueue_with(
        &tx,
        "email",
        "later",
        EnqueueOptions {
            initial_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        },
    );
    scheduler.handle_all_pending();
    reply.blocking_recv().unwrap().unwrap();
    drop(scheduler);
    drop(tx);

    let (_tx, mut scheduler) = test_setup_with_storage(storage);
    scheduler.recover();

    // Still delayed, still not due
    assert_eq!(scheduler.storage().list_delayed().unwrap().len(), 1);
    assert_eq!(scheduler.promote_due_delayed(), 0);
    let stats = scheduler.handle_queue_stats("email").unwrap();
    assert_eq!(stats.delayed, 1);
    assert_eq!(stats.waiting, 0);
}
