use std::sync::atomic::{AtomicU64, Ordering};

// Hands out increasing generations for one logical operation (e.g. "search").
// A response is applied only while its generation is still the latest one issued.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    // Start a new request; every earlier generation becomes stale
    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::SeqCst) == generation.0
    }

    // Makes any in-flight generation stale without starting a new request
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}
