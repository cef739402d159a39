use std::time::Duration;

/// Engine pacing knobs. The defaults are the engine-level throttle
/// guarantees; tests run with [`EngineTuning::instant`].
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Floor between consecutive chunks of one broadcast.
    pub inter_chunk_delay: Duration,
    /// Floor between consecutive campaigns in one scheduler tick.
    pub inter_campaign_delay: Duration,
    /// How many times one chunk is retried after a rate limit.
    pub max_rate_limit_retries: u32,
    /// Sleep before a retry when Discord supplies no retry-after.
    pub rate_limit_backoff: Duration,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            inter_chunk_delay: Duration::from_secs(1),
            inter_campaign_delay: Duration::from_secs(2),
            max_rate_limit_retries: 3,
            rate_limit_backoff: Duration::from_secs(1),
        }
    }
}

impl EngineTuning {
    /// Zero delays, same retry budget. For tests.
    pub fn instant() -> Self {
        Self {
            inter_chunk_delay: Duration::ZERO,
            inter_campaign_delay: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}
