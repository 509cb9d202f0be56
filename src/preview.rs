//! Preview Pipeline
//!
//! Sans-IO state machine driven by the host event loop. The host reports
//! edits, calls [`PreviewPipeline::tick`] with the current time, performs the
//! returned [`PreviewEffect`]s and reports preload outcomes back.
//!
//! Every issued render URL carries a [`Generation`]. Only the latest issued
//! generation may change the displayed image; older completions are ignored.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);
pub const DEFAULT_INDICATOR_GUARD: Duration = Duration::from_secs(10);

/// Monotonically increasing token of an issued render URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    /// No pending render.
    Idle,
    /// An edit occurred and the trailing-edge timer is running.
    Debouncing,
    /// A render URL was issued and is loading off-screen.
    Preloading,
    /// The latest successful load is shown.
    Displaying,
}

/// Side effects the host performs on behalf of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEffect {
    /// Start loading `url` off-screen; report back with `generation`.
    BeginPreload { generation: Generation, url: String },
    /// A newer generation supersedes this one. Hosts may abort the load;
    /// its completion is ignored either way.
    Abandon { generation: Generation },
    /// Swap the visible preview to `url`.
    Display { url: String },
    IndicatorOn,
    IndicatorOff,
}

#[derive(Debug, Clone, Copy)]
pub struct PreviewTiming {
    pub debounce: Duration,
    pub indicator_guard: Duration,
}

impl Default for PreviewTiming {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            indicator_guard: DEFAULT_INDICATOR_GUARD,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    generation: Generation,
    url: String,
}

pub struct PreviewPipeline {
    timing: PreviewTiming,
    state: PreviewState,
    debounce_deadline: Option<Instant>,
    indicator_deadline: Option<Instant>,
    indicator: bool,
    next_generation: u64,
    last_issued_url: Option<String>,
    in_flight: Option<InFlight>,
    displayed: Option<String>,
}

impl PreviewPipeline {
    pub fn new(timing: PreviewTiming) -> Self {
        Self {
            timing,
            state: PreviewState::Idle,
            debounce_deadline: None,
            indicator_deadline: None,
            indicator: false,
            next_generation: 0,
            last_issued_url: None,
            in_flight: None,
            displayed: None,
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    /// URL currently shown, if any load has ever succeeded.
    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn indicator(&self) -> bool {
        self.indicator
    }

    /// Latest issued generation.
    pub fn latest_generation(&self) -> Option<Generation> {
        self.next_generation.checked_sub(1).map(Generation)
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.indicator_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Record an edit: (re)start the debounce timer.
    pub fn edit(&mut self, now: Instant) {
        self.debounce_deadline = Some(now + self.timing.debounce);
        self.state = PreviewState::Debouncing;
    }

    /// Advance timers. `render_url` is called at most once, when the
    /// debounce timer fires; `None` means nothing can be rendered yet.
    pub fn tick<F>(&mut self, now: Instant, render_url: F) -> Vec<PreviewEffect>
    where
        F: FnOnce() -> Option<String>,
    {
        let mut effects = Vec::new();

        if self.debounce_deadline.is_some_and(|deadline| now >= deadline) {
            self.debounce_deadline = None;
            match render_url() {
                Some(url) => self.issue(now, url, &mut effects),
                None => self.settle(),
            }
        }

        if self.indicator_deadline.is_some_and(|deadline| now >= deadline) {
            self.indicator_deadline = None;
            if self.indicator {
                warn!("render indicator guard elapsed before the preview loaded");
                self.indicator = false;
                effects.push(PreviewEffect::IndicatorOff);
            }
        }

        effects
    }

    fn issue(&mut self, now: Instant, url: String, effects: &mut Vec<PreviewEffect>) {
        if self.last_issued_url.as_deref() == Some(url.as_str()) {
            debug!("render URL unchanged, skipping preload");
            self.settle();
            return;
        }

        let generation = Generation(self.next_generation);
        self.next_generation += 1;

        if let Some(previous) = self.in_flight.take() {
            effects.push(PreviewEffect::Abandon {
                generation: previous.generation,
            });
        }

        debug!(generation = generation.0, %url, "issuing preview render");
        self.last_issued_url = Some(url.clone());
        self.in_flight = Some(InFlight {
            generation,
            url: url.clone(),
        });
        effects.push(PreviewEffect::BeginPreload { generation, url });

        // The guard runs from when the indicator was raised.
        if !self.indicator {
            self.indicator = true;
            self.indicator_deadline = Some(now + self.timing.indicator_guard);
            effects.push(PreviewEffect::IndicatorOn);
        }
        self.state = PreviewState::Preloading;
    }

    fn is_latest(&self, generation: Generation) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
    }

    /// State to rest in once nothing is pending.
    fn settle(&mut self) {
        if self.debounce_deadline.is_some() {
            self.state = PreviewState::Debouncing;
        } else if self.in_flight.is_some() {
            self.state = PreviewState::Preloading;
        } else if self.displayed.is_some() {
            self.state = PreviewState::Displaying;
        } else {
            self.state = PreviewState::Idle;
        }
    }

    fn clear_indicator(&mut self, effects: &mut Vec<PreviewEffect>) {
        self.indicator_deadline = None;
        if self.indicator {
            self.indicator = false;
            effects.push(PreviewEffect::IndicatorOff);
        }
    }

    /// The off-screen load of `generation` finished.
    pub fn preload_succeeded(&mut self, generation: Generation) -> Vec<PreviewEffect> {
        let mut effects = Vec::new();
        if !self.is_latest(generation) {
            debug!(generation = generation.0, "discarding stale preview load");
            return effects;
        }

        if let Some(done) = self.in_flight.take() {
            self.displayed = Some(done.url.clone());
            effects.push(PreviewEffect::Display { url: done.url });
        }
        self.clear_indicator(&mut effects);
        self.settle();
        effects
    }

    /// The off-screen load of `generation` failed; the prior image stays.
    pub fn preload_failed(&mut self, generation: Generation) -> Vec<PreviewEffect> {
        let mut effects = Vec::new();
        if !self.is_latest(generation) {
            return effects;
        }

        warn!(generation = generation.0, "preview image failed to load");
        self.in_flight = None;
        // Allow the same URL to be retried by the next edit.
        self.last_issued_url = self.displayed.clone();
        self.clear_indicator(&mut effects);
        self.settle();
        effects
    }

    /// Cancel the debounce timer. In-flight loads are left to finish.
    pub fn teardown(&mut self) {
        self.debounce_deadline = None;
        self.indicator_deadline = None;
        self.settle();
    }
}

impl Default for PreviewPipeline {
    fn default() -> Self {
        Self::new(PreviewTiming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> (PreviewPipeline, Instant) {
        (PreviewPipeline::default(), Instant::now())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn preload(effects: &[PreviewEffect]) -> Option<(Generation, String)> {
        effects.iter().find_map(|e| match e {
            PreviewEffect::BeginPreload { generation, url } => Some((*generation, url.clone())),
            _ => None,
        })
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let (mut p, t0) = pipeline();
        let mut issued = 0;
        for i in 0..5 {
            p.edit(t0 + ms(i * 100));
            let effects = p.tick(t0 + ms(i * 100 + 50), || {
                issued += 1;
                Some(format!("u{}", i))
            });
            assert!(effects.is_empty());
        }
        assert_eq!(p.state(), PreviewState::Debouncing);

        let effects = p.tick(t0 + ms(400 + 350), || {
            issued += 1;
            Some("u4".into())
        });
        assert_eq!(issued, 1);
        assert_eq!(preload(&effects).map(|(_, u)| u).as_deref(), Some("u4"));
        assert!(effects.contains(&PreviewEffect::IndicatorOn));
        assert_eq!(p.state(), PreviewState::Preloading);
    }

    #[test]
    fn test_success_displays() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g, _) = preload(&p.tick(t0 + ms(350), || Some("a".into()))).unwrap();
        let effects = p.preload_succeeded(g);
        assert_eq!(
            effects,
            vec![PreviewEffect::Display { url: "a".into() }, PreviewEffect::IndicatorOff]
        );
        assert_eq!(p.displayed(), Some("a"));
        assert_eq!(p.state(), PreviewState::Displaying);
        assert!(!p.indicator());
    }

    #[test]
    fn test_same_url_is_noop() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g, _) = preload(&p.tick(t0 + ms(350), || Some("a".into()))).unwrap();
        p.preload_succeeded(g);

        p.edit(t0 + ms(1000));
        let effects = p.tick(t0 + ms(1350), || Some("a".into()));
        assert!(effects.is_empty());
        assert_eq!(p.state(), PreviewState::Displaying);
        assert_eq!(p.displayed(), Some("a"));
    }

    #[test]
    fn test_same_url_while_loading_stays_preloading() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g, _) = preload(&p.tick(t0 + ms(350), || Some("a".into()))).unwrap();

        p.edit(t0 + ms(400));
        assert!(p.tick(t0 + ms(750), || Some("a".into())).is_empty());
        assert_eq!(p.state(), PreviewState::Preloading);
        assert!(p.indicator());
        assert_eq!(p.latest_generation(), Some(g));

        p.preload_succeeded(g);
        assert_eq!(p.state(), PreviewState::Displaying);
    }

    #[test]
    fn test_indicator_guard_not_rearmed_by_reissue() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        p.tick(t0 + ms(350), || Some("one".into()));

        p.edit(t0 + ms(5000));
        let effects = p.tick(t0 + ms(5350), || Some("two".into()));
        assert!(!effects.contains(&PreviewEffect::IndicatorOn));
        assert_eq!(p.next_deadline(), Some(t0 + ms(350) + DEFAULT_INDICATOR_GUARD));

        let effects = p.tick(t0 + ms(350) + DEFAULT_INDICATOR_GUARD, || None);
        assert_eq!(effects, vec![PreviewEffect::IndicatorOff]);
        assert_eq!(p.state(), PreviewState::Preloading);
    }

    #[test]
    fn test_stale_completion_discarded() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g1, _) = preload(&p.tick(t0 + ms(350), || Some("one".into()))).unwrap();

        p.edit(t0 + ms(400));
        let effects = p.tick(t0 + ms(750), || Some("two".into()));
        let (g2, _) = preload(&effects).unwrap();
        assert!(g2 > g1);
        assert!(effects.contains(&PreviewEffect::Abandon { generation: g1 }));

        assert_eq!(p.preload_succeeded(g2), vec![
            PreviewEffect::Display { url: "two".into() },
            PreviewEffect::IndicatorOff,
        ]);
        assert!(p.preload_succeeded(g1).is_empty());
        assert_eq!(p.displayed(), Some("two"));
    }

    #[test]
    fn test_stale_completion_before_latest_is_ignored() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g1, _) = preload(&p.tick(t0 + ms(350), || Some("one".into()))).unwrap();
        p.edit(t0 + ms(400));
        let (g2, _) = preload(&p.tick(t0 + ms(750), || Some("two".into()))).unwrap();

        assert!(p.preload_succeeded(g1).is_empty());
        assert_eq!(p.displayed(), None);
        assert!(p.indicator());
        p.preload_succeeded(g2);
        assert_eq!(p.displayed(), Some("two"));
    }

    #[test]
    fn test_failure_keeps_previous_image() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g1, _) = preload(&p.tick(t0 + ms(350), || Some("good".into()))).unwrap();
        p.preload_succeeded(g1);

        p.edit(t0 + ms(1000));
        let (g2, _) = preload(&p.tick(t0 + ms(1350), || Some("broken".into()))).unwrap();
        assert_eq!(p.preload_failed(g2), vec![PreviewEffect::IndicatorOff]);
        assert_eq!(p.displayed(), Some("good"));
        assert_eq!(p.state(), PreviewState::Displaying);

        // The failed URL may be retried.
        p.edit(t0 + ms(2000));
        assert!(preload(&p.tick(t0 + ms(2350), || Some("broken".into()))).is_some());
    }

    #[test]
    fn test_failure_without_prior_image_is_idle() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g, _) = preload(&p.tick(t0 + ms(350), || Some("x".into()))).unwrap();
        p.preload_failed(g);
        assert_eq!(p.state(), PreviewState::Idle);
        assert_eq!(p.displayed(), None);
    }

    #[test]
    fn test_indicator_guard() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        let (g, _) = preload(&p.tick(t0 + ms(350), || Some("slow".into()))).unwrap();
        assert!(p.tick(t0 + ms(5000), || None).is_empty());

        let effects = p.tick(t0 + ms(350) + DEFAULT_INDICATOR_GUARD, || None);
        assert_eq!(effects, vec![PreviewEffect::IndicatorOff]);
        assert!(!p.indicator());
        assert_eq!(p.state(), PreviewState::Preloading);

        // The load itself still completes.
        assert_eq!(p.preload_succeeded(g), vec![PreviewEffect::Display { url: "slow".into() }]);
    }

    #[test]
    fn test_teardown_cancels_debounce() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        p.teardown();
        assert!(p.tick(t0 + ms(1000), || Some("x".into())).is_empty());
        assert_eq!(p.state(), PreviewState::Idle);
        assert_eq!(p.next_deadline(), None);
    }

    #[test]
    fn test_nothing_to_render() {
        let (mut p, t0) = pipeline();
        p.edit(t0);
        assert!(p.tick(t0 + ms(350), || None).is_empty());
        assert_eq!(p.state(), PreviewState::Idle);
        assert_eq!(p.latest_generation(), None);
    }
}
