//! Clocks
//!
//! A [`Clock`] turns a `start`/`stop` pair into an elapsed duration in
//! seconds. Two families exist:
//! - observation clocks read a monotonic source twice and subtract
//! - event clocks record timeline events, block on a synchronisation barrier
//!   at `stop`, and normalise the timeline's milliseconds to seconds

use crate::error::QuarkError;

/// Timing strategy driven by [`crate::Timer`]
pub trait Clock {
    /// Begin one measured repetition
    fn start(&mut self) -> Result<(), QuarkError>;
    /// End the repetition and return its duration in seconds
    fn stop(&mut self) -> Result<f64, QuarkError>;
}

// ─── Observation clocks ──────────────────────────────────────────────────────

/// Source of timestamps in seconds
pub trait Observe {
    /// Current timestamp in seconds from an arbitrary origin
    fn observe(&mut self) -> f64;
}

/// Monotonic wall clock based on [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicSource {
    origin: std::time::Instant,
}

impl Default for MonotonicSource {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Observe for MonotonicSource {
    #[inline(always)]
    fn observe(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock computing `end - start` from two observations
#[derive(Debug, Clone, Default)]
pub struct ObservedClock<O> {
    source: O,
    started: Option<f64>,
}

impl<O: Observe> ObservedClock<O> {
    /// Wrap an observation source
    pub fn new(source: O) -> Self {
        Self {
            source,
            started: None,
        }
    }
}

impl<O: Observe> Clock for ObservedClock<O> {
    #[inline(always)]
    fn start(&mut self) -> Result<(), QuarkError> {
        self.started = Some(self.source.observe());
        Ok(())
    }

    #[inline(always)]
    fn stop(&mut self) -> Result<f64, QuarkError> {
        let end = self.source.observe();
        let begin = self
            .started
            .take()
            .ok_or_else(|| QuarkError::Timing("clock stopped before it was started".into()))?;
        Ok(end - begin)
    }
}

/// Default `generic` timer clock
pub type WallClock = ObservedClock<MonotonicSource>;

// ─── Event clocks ────────────────────────────────────────────────────────────

/// Timeline that records events and reports the time between them
pub trait DeviceTimeline {
    /// Recorded marker
    type Event;
    /// Enqueue a marker on the timeline
    fn record(&mut self) -> Result<Self::Event, QuarkError>;
    /// Block until all enqueued work has completed
    fn synchronize(&mut self) -> Result<(), QuarkError>;
    /// Milliseconds between two completed markers
    fn elapsed_ms(&self, start: &Self::Event, end: &Self::Event) -> Result<f64, QuarkError>;
}

/// Clock overriding start/stop with timeline events
pub struct EventClock<T: DeviceTimeline> {
    timeline: T,
    started: Option<T::Event>,
}

impl<T: DeviceTimeline> EventClock<T> {
    /// Wrap a timeline
    pub fn new(timeline: T) -> Self {
        Self {
            timeline,
            started: None,
        }
    }

    /// Access the underlying timeline
    pub fn timeline(&self) -> &T {
        &self.timeline
    }
}

impl<T: DeviceTimeline> Clock for EventClock<T> {
    fn start(&mut self) -> Result<(), QuarkError> {
        self.started = Some(self.timeline.record()?);
        Ok(())
    }

    fn stop(&mut self) -> Result<f64, QuarkError> {
        let end = self.timeline.record()?;
        self.timeline.synchronize()?;
        let begin = self
            .started
            .take()
            .ok_or_else(|| QuarkError::Timing("event clock stopped before it was started".into()))?;
        Ok(self.timeline.elapsed_ms(&begin, &end)? / 1e3)
    }
}

/// Timeline of the host thread
///
/// Work issued by the native backend completes before control returns, so
/// synchronisation only counts barriers.
#[derive(Debug, Default)]
pub struct HostTimeline {
    barriers: u64,
}

impl HostTimeline {
    /// Number of synchronisation barriers passed so far
    pub fn barriers(&self) -> u64 {
        self.barriers
    }
}

impl DeviceTimeline for HostTimeline {
    type Event = std::time::Instant;

    fn record(&mut self) -> Result<Self::Event, QuarkError> {
        Ok(std::time::Instant::now())
    }

    fn synchronize(&mut self) -> Result<(), QuarkError> {
        self.barriers += 1;
        Ok(())
    }

    fn elapsed_ms(&self, start: &Self::Event, end: &Self::Event) -> Result<f64, QuarkError> {
        Ok(end.saturating_duration_since(*start).as_secs_f64() * 1e3)
    }
}
