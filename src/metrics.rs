//! Prometheus-compatible metrics endpoint
//!
//! Exposes game server metrics in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Rolling window for tick time percentiles
const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // World
    pub fruit_count: AtomicU64,
    pub wall_count: AtomicU64,
    pub score: AtomicU64,
    pub merges_total: AtomicU64,
    pub resets_total: AtomicU64,

    // Drops
    pub drops_accepted: AtomicU64,
    pub drops_rejected: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub frames_sent: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub messages_received: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            fruit_count: AtomicU64::new(0),
            wall_count: AtomicU64::new(0),
            score: AtomicU64::new(0),
            merges_total: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            drops_accepted: AtomicU64::new(0),
            drops_rejected: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Record one frame handed to a session queue
    #[inline]
    pub fn record_frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        // World
        metric!("fruit_merge_fruit", "Number of fruit in the world", "gauge",
            self.fruit_count.load(Ordering::Relaxed));
        metric!("fruit_merge_walls", "Number of static walls", "gauge",
            self.wall_count.load(Ordering::Relaxed));
        metric!("fruit_merge_score", "Score of the current round", "gauge",
            self.score.load(Ordering::Relaxed));
        metric!("fruit_merge_merges_total", "Total merges resolved", "counter",
            self.merges_total.load(Ordering::Relaxed));
        metric!("fruit_merge_resets_total", "Total rounds lost", "counter",
            self.resets_total.load(Ordering::Relaxed));
        metric!("fruit_merge_drops_accepted_total", "Drop requests that spawned a fruit", "counter",
            self.drops_accepted.load(Ordering::Relaxed));
        metric!("fruit_merge_drops_rejected_total", "Drop requests rejected", "counter",
            self.drops_rejected.load(Ordering::Relaxed));

        // Performance
        metric!("fruit_merge_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("fruit_merge_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("fruit_merge_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("fruit_merge_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("fruit_merge_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        // Network
        metric!("fruit_merge_connections_active", "Active WebTransport sessions", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("fruit_merge_frames_sent_total", "Frames queued to sessions", "counter",
            self.frames_sent.load(Ordering::Relaxed));
        metric!("fruit_merge_frames_dropped_total", "Frames dropped for lagging sessions", "counter",
            self.frames_dropped.load(Ordering::Relaxed));
        metric!("fruit_merge_bytes_sent_total", "Total bytes queued to sessions", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("fruit_merge_messages_received_total", "Total client messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("fruit_merge_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same counters
    pub fn to_json(&self) -> String {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        let body = serde_json::json!({
            "world": {
                "fruit": load(&self.fruit_count),
                "walls": load(&self.wall_count),
                "score": load(&self.score),
                "merges": load(&self.merges_total),
                "resets": load(&self.resets_total),
            },
            "drops": {
                "accepted": load(&self.drops_accepted),
                "rejected": load(&self.drops_rejected),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "network": {
                "connections": load(&self.connections_active),
                "frames_sent": load(&self.frames_sent),
                "frames_dropped": load(&self.frames_dropped),
                "bytes_sent": load(&self.bytes_sent),
                "messages_received": load(&self.messages_received),
            },
            "uptime_seconds": self.uptime_seconds(),
        });
        serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Route a raw HTTP request line to a response
fn route(request: &str, metrics: &Metrics) -> String {
    if request.starts_with("GET /metrics/json") {
        http_response("200 OK", "application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response(
            "200 OK",
            "text/plain; version=0.0.4",
            &metrics.to_prometheus(),
        )
    } else if request.starts_with("GET /health") {
        http_response("200 OK", "text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(
    metrics: Arc<Metrics>,
    bind_address: String,
    port: u16,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&request, &metrics);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
