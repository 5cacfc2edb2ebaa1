use crate::error::{ShorteningError, SynthesisError};
use crate::tts::{
    Shortened, ShorteningRequest, SpeechSynthesizer, Synthesized, SynthesisRequest, TextShortener,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Rate-limiting decorator: consecutive calls through the same wrapper start at
/// least `min_interval` apart, across all threads sharing it.
pub struct Throttled<T> {
    inner: T,
    label: &'static str,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<T> Throttled<T> {
    pub fn new(inner: T, label: &'static str, min_interval: Duration) -> Self {
        Self {
            inner,
            label,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Block until the interval since the previous call has elapsed, then claim the slot.
    fn wait_turn(&self) {
        // The slot is held while sleeping so concurrent callers queue up behind it.
        let mut last = match self.last_call.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                info!(
                    "{} rate limit: waiting {:.2}s",
                    self.label.to_uppercase(),
                    wait.as_secs_f64()
                );
                std::thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }
}

impl<T: SpeechSynthesizer> SpeechSynthesizer for Throttled<T> {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Synthesized, SynthesisError> {
        self.wait_turn();
        self.inner.synthesize(request)
    }

    fn engine_name(&self) -> &str {
        self.inner.engine_name()
    }
}

impl<T: TextShortener> TextShortener for Throttled<T> {
    fn shorten(&self, request: &ShorteningRequest<'_>) -> Result<Shortened, ShorteningError> {
        self.wait_turn();
        self.inner.shorten(request)
    }
}
