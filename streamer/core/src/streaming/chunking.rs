//! Adaptive Chunk Controller
//!
//! Maintains the read granularity for one stream. Chunk size trades
//! throughput (larger reads, fewer round trips) against memory headroom;
//! the controller hunts toward the largest stable size under current load
//! without operator tuning.
//!
//! Transitions:
//! - a run of consecutive pressure events (4 by default) halves the size,
//!   floored at the minimum, and restarts the run
//! - a clean iteration with wide headroom (`used < capacity / 4`) doubles
//!   the size, capped at the maximum
//! - once 3+ pressure events have accumulated since the last relief action,
//!   every successful iteration gets an extra fixed throttle delay until a
//!   relief action fires again

use tracing::debug;

use crate::config::EngineConfig;

/// Per-stream adaptive chunk sizing state
#[derive(Debug)]
pub struct ChunkPolicy {
    current: usize,
    min: usize,
    max: usize,
    /// Consecutive pressure events since the last halving or clean iteration
    streak: u32,
    /// Pressure events since the last relief action fired
    since_relief: u32,
    pressure_threshold: u32,
    throttle_after: u32,
    total_pressure: u64,
    halvings: u32,
    growths: u32,
}

impl ChunkPolicy {
    /// Create a policy from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_initial(config, config.chunk_initial)
    }

    /// Create a policy starting from a caller-chosen size (seek requests
    /// carry one), clamped into the configured bounds
    #[must_use]
    pub fn with_initial(config: &EngineConfig, initial: usize) -> Self {
        Self {
            current: initial.clamp(config.chunk_min, config.chunk_max),
            min: config.chunk_min,
            max: config.chunk_max,
            streak: 0,
            since_relief: 0,
            pressure_threshold: config.pressure_threshold,
            throttle_after: config.throttle_after,
            total_pressure: 0,
            halvings: 0,
            growths: 0,
        }
    }

    /// Current read granularity in bytes; always within `[min, max]`
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.current
    }

    /// Total pressure events observed over the stream's lifetime
    #[must_use]
    pub fn pressure_events(&self) -> u64 {
        self.total_pressure
    }

    /// Number of halvings applied
    #[must_use]
    pub fn halvings(&self) -> u32 {
        self.halvings
    }

    /// Record one pressure event; returns true if it triggered a halving
    pub fn record_pressure(&mut self) -> bool {
        self.streak += 1;
        self.since_relief += 1;
        self.total_pressure += 1;
        if self.streak >= self.pressure_threshold {
            let previous = self.current;
            self.current = (self.current / 2).max(self.min);
            self.streak = 0;
            self.halvings += 1;
            debug!(
                from = previous,
                to = self.current,
                "sustained memory pressure; chunk size halved"
            );
            true
        } else {
            false
        }
    }

    /// Note that a relief action actually fired
    pub fn note_relief_fired(&mut self) {
        self.since_relief = 0;
    }

    /// Note an iteration whose reservation succeeded without pressure
    ///
    /// Resets the consecutive-pressure run and grows the chunk size when
    /// usage is far below the ceiling. Returns true if it grew.
    pub fn note_clean_iteration(&mut self, used: u64, capacity: u64) -> bool {
        let grew = self.streak == 0 && used < capacity / 4 && self.current < self.max;
        if grew {
            let previous = self.current;
            self.current = (self.current * 2).min(self.max);
            self.growths += 1;
            debug!(
                from = previous,
                to = self.current,
                "wide memory headroom; chunk size doubled"
            );
        }
        self.streak = 0;
        grew
    }

    /// Whether successful iterations should currently be throttled
    #[must_use]
    pub fn should_throttle(&self) -> bool {
        self.since_relief >= self.throttle_after
    }
}
