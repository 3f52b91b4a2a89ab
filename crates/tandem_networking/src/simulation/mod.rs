//! # Network Simulation
//!
//! Deterministic latency and jitter for the loopback hub.
//!
//! Delays are counted in hub ticks, not wall time, so a test that advances
//! the hub once per frame replays the same delivery order every run.

use tandem_shared::NetworkConfig;

/// Delivery conditions between two peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConditions {
    /// Fixed delay in hub ticks.
    pub latency_ticks: u32,
    /// Extra random delay, uniformly 0..=jitter_ticks.
    pub jitter_ticks: u32,
}

impl NetworkConditions {
    /// Instant delivery.
    pub const PERFECT: Self = Self { latency_ticks: 0, jitter_ticks: 0 };

    /// Same machine / LAN.
    pub const LAN: Self = Self { latency_ticks: 1, jitter_ticks: 0 };

    /// Home broadband at 60 Hz (~50ms, some reordering).
    pub const AVERAGE: Self = Self { latency_ticks: 3, jitter_ticks: 2 };

    /// Mobile / congested wifi at 60 Hz (~100ms, heavy reordering).
    pub const POOR: Self = Self { latency_ticks: 6, jitter_ticks: 4 };

    /// Builds conditions from the `[network]` config section.
    #[must_use]
    pub const fn from_config(config: &NetworkConfig) -> Self {
        Self {
            latency_ticks: config.latency_ticks,
            jitter_ticks: config.jitter_ticks,
        }
    }

    /// Delay for one packet given a random value.
    #[must_use]
    pub const fn delay_ticks(&self, rng_value: u32) -> u32 {
        let jitter = if self.jitter_ticks > 0 {
            rng_value % (self.jitter_ticks + 1)
        } else {
            0
        };
        self.latency_ticks + jitter
    }

    /// True if every packet is delivered immediately.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        self.latency_ticks == 0 && self.jitter_ticks == 0
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::PERFECT
    }
}

/// Minimal deterministic generator (MINSTD LCG).
#[derive(Clone, Debug)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    const MODULUS: u64 = 2_147_483_647;

    /// Creates a generator. A seed that would pin the LCG at zero is remapped.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        let state = seed % Self::MODULUS;
        Self { state: if state == 0 { 1 } else { state } }
    }

    /// Next value in `1..2^31-1`.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(48271) % Self::MODULUS;
        self.state as u32
    }
}
