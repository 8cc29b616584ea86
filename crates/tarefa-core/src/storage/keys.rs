//! Key encoding for RocksDB column families.
//!
//! All numeric values use big-endian encoding for correct lexicographic
//! ordering. Composite keys use `:` (0x3A) as separator. Variable-length
//! strings are length-prefixed with a big-endian u16.

const SEPARATOR: u8 = b':';

/// Encode a u64 as 8 big-endian bytes.
fn encode_u64(val: u64) -> [u8; 8] {
    val.to_be_bytes()
}

/// Encode a variable-length string with a 2-byte big-endian length prefix.
fn encode_string(s: &str) -> Vec<u8> {
    let len = u16::try_from(s.len()).expect("key string exceeds 64 KiB");
    let mut buf = Vec::with_capacity(2 + s.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf
}

/// Build a waiting-job key: `{queue}:{created_at_ns}:{job_id}`.
///
/// Queue-first layout keeps each queue's jobs contiguous; the timestamp plus
/// UUIDv7 tail yields FIFO order within a queue.
pub fn job_key(queue: &str, created_at_ns: u64, job_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(&encode_string(queue));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_u64(created_at_ns));
    key.push(SEPARATOR);
    key.extend_from_slice(job_id.as_bytes());
    key
}

/// Build a prefix for iterating all waiting jobs in a queue.
pub fn job_prefix(queue: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(32);
    prefix.extend_from_slice(&encode_string(queue));
    prefix.push(SEPARATOR);
    prefix
}

/// Build a claim key: `{queue}:{job_id}`.
pub fn claim_key(queue: &str, job_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&encode_string(queue));
    key.push(SEPARATOR);
    key.extend_from_slice(job_id.as_bytes());
    key
}

/// Build a claim expiry key: `{expiry_ns}:{queue}:{job_id}`.
///
/// Timestamp-first layout enables "scan from earliest expiry" iteration for
/// stall detection.
pub fn claim_expiry_key(expiry_ns: u64, queue: &str, job_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(&encode_u64(expiry_ns));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_string(queue));
    key.push(SEPARATOR);
    key.extend_from_slice(job_id.as_bytes());
    key
}

/// Parse `{queue}:{job_id}` back out of a claim expiry key.
pub fn parse_claim_expiry_key(key: &[u8]) -> Option<(String, uuid::Uuid)> {
    // 8-byte timestamp + separator
    let rest = key.get(9..)?;
    let len = u16::from_be_bytes([*rest.first()?, *rest.get(1)?]) as usize;
    let queue = std::str::from_utf8(rest.get(2..2 + len)?).ok()?.to_string();
    // separator after the queue string
    let id_bytes = rest.get(2 + len + 1..)?;
    let job_id = uuid::Uuid::from_slice(id_bytes).ok()?;
    Some((queue, job_id))
}

/// Build an upper bound for scanning claim expiries up to `now_ns`. The
/// 0xFF fill sorts after any real key carrying that timestamp.
pub fn claim_expiry_upper_bound(now_ns: u64) -> Vec<u8> {
    let mut up_to = Vec::with_capacity(40);
    up_to.extend_from_slice(&encode_u64(now_ns));
    up_to.extend_from_slice(&[0xFF; 32]);
    up_to
}

/// Encode a claim value: `{worker_id}:{expiry_ns}`.
pub fn claim_value(worker_id: &str, expiry_ns: u64) -> Vec<u8> {
    let mut val = Vec::with_capacity(32);
    val.extend_from_slice(&encode_string(worker_id));
    val.push(SEPARATOR);
    val.extend_from_slice(&encode_u64(expiry_ns));
    val
}

/// Extract the expiry timestamp from a claim value (last 8 bytes, big-endian).
pub fn parse_expiry_from_claim_value(value: &[u8]) -> Option<u64> {
    if value.len() < 8 {
        return None;
    }
    let bytes: [u8; 8] = value[value.len() - 8..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Build a delayed-job key: `{visible_at_ns}:{queue}:{job_id}`.
///
/// Timestamp-first layout means promotion is a bounded forward scan. The
/// UUIDv7 tail breaks ties among equal deadlines in insertion order.
pub fn delayed_key(visible_at_ns: u64, queue: &str, job_id: &uuid::Uuid) -> Vec<u8> {
    // Same shape as claim expiry keys.
    claim_expiry_key(visible_at_ns, queue, job_id)
}

/// Upper bound for scanning delayed jobs due at or before `now_ns`.
pub fn delayed_upper_bound(now_ns: u64) -> Vec<u8> {
    claim_expiry_upper_bound(now_ns)
}

/// Build a completed-record key: `{queue}:{completed_at_ns}:{job_id}`.
pub fn completed_key(queue: &str, completed_at_ns: u64, job_id: &uuid::Uuid) -> Vec<u8> {
    job_key(queue, completed_at_ns, job_id)
}

/// Prefix for iterating a queue's completed records (oldest first).
pub fn completed_prefix(queue: &str) -> Vec<u8> {
    job_prefix(queue)
}

/// Build a dead-letter key: `{original_queue}:{failed_at_ns}:{record_id}`.
///
/// `record_id` is a fresh UUIDv7, not the job id — the origin id may be
/// absent, and the sink must append without ever overwriting.
pub fn dead_letter_key(original_queue: &str, failed_at_ns: u64, record_id: &uuid::Uuid) -> Vec<u8> {
    job_key(original_queue, failed_at_ns, record_id)
}

/// Prefix for iterating dead-letter records from one origin queue.
pub fn dead_letter_prefix(original_queue: &str) -> Vec<u8> {
    job_prefix(original_queue)
}
