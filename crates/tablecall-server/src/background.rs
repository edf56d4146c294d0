//! Background tasks for the tablecall server.

use tablecall_voice::AudioCache;
use tokio::time::{sleep, Duration};

/// Starts the synthesized-audio sweep task.
///
/// Runs indefinitely, dropping published clips whose TTL has elapsed.
/// Clips still held by an in-flight call turn are never touched.
pub async fn start_audio_sweep_task(cache: AudioCache, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("audio sweep task disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, "starting audio sweep task");

    loop {
        sleep(interval).await;

        let swept = cache.sweep();
        if swept > 0 {
            tracing::info!(count = swept, remaining = cache.len(), "swept expired audio");
        } else {
            tracing::debug!("no expired audio to sweep");
        }
    }
}
