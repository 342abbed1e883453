// Worker and coordinator constants (ADR: No magic values)
use std::time::Duration;

/// Well-known broker queue carrying outbound SMS payloads
pub const SMS_TASK_QUEUE: &str = "sms_task_queue";

/// First ticket sequence number after startup or reset
pub const FIRST_TICKET_SEQUENCE: u64 = 1;

/// Upper bound on a single publish call from the request path (5s)
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single SMS gateway call (30s)
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Deliveries processed at once by one worker
pub const DEFAULT_WORKER_CONCURRENCY: usize = 1;

/// Pause before a failed delivery is requeued (5s)
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Bound on the initial broker handshake (10s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Unacknowledged deliveries the broker may push to one consumer
pub const DEFAULT_PREFETCH_COUNT: u16 = 10;

/// Sleep after a broker stream error before pulling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Time allowed for in-flight deliveries to finish on shutdown (5s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
