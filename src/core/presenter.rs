use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(2_000);
pub const DEFAULT_STEPS: u32 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(u64);

/// Repeating timers, started and cancelled by id.
pub trait Scheduler {
    fn start(&mut self, every: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// A single count-up from zero to `target` in a fixed number of ticks.
#[derive(Debug, Clone)]
pub struct Presentation {
    target: u64,
    steps: u32,
    increment: f64,
    accumulator: f64,
    emitted: u32,
}

impl Presentation {
    pub fn new(target: u64, steps: u32) -> Self {
        let steps = steps.max(1);
        Self {
            target,
            steps,
            increment: target as f64 / steps as f64,
            accumulator: 0.0,
            emitted: 0,
        }
    }

    pub fn interval(duration: Duration, steps: u32) -> Duration {
        (duration / steps.max(1)).max(Duration::from_nanos(1))
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn is_finished(&self) -> bool {
        self.emitted >= self.steps
    }

    /// Next displayed value, or `None` once all ticks have been emitted.
    /// The last tick is always exactly `target`.
    pub fn next_tick(&mut self) -> Option<u64> {
        if self.is_finished() {
            return None;
        }
        self.emitted += 1;
        self.accumulator += self.increment;
        if self.emitted == self.steps {
            return Some(self.target);
        }
        Some((self.accumulator.round() as u64).min(self.target))
    }
}

/// Owns one display slot: at most one presentation (and one timer) is live.
pub struct ValuePresenter<S: Scheduler> {
    scheduler: S,
    duration: Duration,
    steps: u32,
    active: Option<(TimerId, Presentation)>,
    displayed: u64,
}

impl<S: Scheduler> ValuePresenter<S> {
    pub fn new(scheduler: S, duration: Duration, steps: u32) -> Self {
        Self {
            scheduler,
            duration,
            steps,
            active: None,
            displayed: 0,
        }
    }

    /// Starts counting up to `target`. A running presentation for a different
    /// target is cancelled first; the same target keeps running.
    pub fn present(&mut self, target: u64) -> TimerId {
        if let Some((id, presentation)) = &self.active {
            if presentation.target() == target {
                return *id;
            }
        }
        self.cancel();

        let id = self
            .scheduler
            .start(Presentation::interval(self.duration, self.steps));
        debug!(?id, target, steps = self.steps, "presentation started");
        self.active = Some((id, Presentation::new(target, self.steps)));
        self.displayed = 0;
        id
    }

    pub fn cancel(&mut self) {
        if let Some((id, _)) = self.active.take() {
            self.scheduler.cancel(id);
            debug!(?id, "presentation cancelled");
        }
    }

    /// Feeds a timer fire. Fires from superseded timers are dropped.
    pub fn on_timer(&mut self, id: TimerId) -> Option<u64> {
        let (active_id, presentation) = self.active.as_mut()?;
        if *active_id != id {
            return None;
        }
        let value = presentation.next_tick()?;
        self.displayed = value;
        if presentation.is_finished() {
            let finished = *active_id;
            self.active = None;
            self.scheduler.cancel(finished);
        }
        Some(value)
    }

    pub fn displayed(&self) -> u64 {
        self.displayed
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

#[derive(Debug, Clone, Copy)]
struct VirtualTimer {
    every: Duration,
    next_due: Duration,
}

/// Deterministic scheduler: time only moves when `advance` is called.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, VirtualTimer>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Moves time forward and returns every fire in due order (ties by id).
    pub fn advance(&mut self, by: Duration) -> Vec<TimerId> {
        let until = self.now + by;
        let mut fired = Vec::new();
        loop {
            let next = self
                .timers
                .iter()
                .filter(|(_, timer)| timer.next_due <= until)
                .min_by_key(|(id, timer)| (timer.next_due, **id))
                .map(|(id, timer)| (*id, timer.next_due));
            let Some((id, due)) = next else {
                break;
            };
            if let Some(timer) = self.timers.get_mut(&id) {
                timer.next_due = due + timer.every;
            }
            self.now = due;
            fired.push(id);
        }
        self.now = until;
        fired
    }
}

impl Scheduler for VirtualClock {
    fn start(&mut self, every: Duration) -> TimerId {
        let every = every.max(Duration::from_nanos(1));
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(
            id,
            VirtualTimer {
                every,
                next_due: self.now + every,
            },
        );
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }
}

impl ValuePresenter<VirtualClock> {
    /// Advances the virtual clock and returns the values displayed meanwhile.
    pub fn pump(&mut self, by: Duration) -> Vec<u64> {
        let fired = self.scheduler.advance(by);
        fired
            .into_iter()
            .filter_map(|id| self.on_timer(id))
            .collect()
    }
}

/// Real timers on the tokio runtime. Fires arrive on an internal channel and
/// cancelled timers have their task aborted.
pub struct TokioScheduler {
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<TimerId>,
    rx: mpsc::UnboundedReceiver<TimerId>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            next_id: 0,
            tasks: HashMap::new(),
            tx,
            rx,
        }
    }

    pub async fn next_fire(&mut self) -> Option<TimerId> {
        self.rx.recv().await
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn start(&mut self, every: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut interval = tokio::time::interval_at(start, every);
            loop {
                interval.tick().await;
                if tx.send(id).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.tasks.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

/// Counts up to `target` on real timers, calling `on_tick` for each value.
pub async fn animate<F>(target: u64, duration: Duration, steps: u32, mut on_tick: F) -> u64
where
    F: FnMut(u64),
{
    let mut presenter = ValuePresenter::new(TokioScheduler::new(), duration, steps);
    presenter.present(target);
    while presenter.is_running() {
        let Some(id) = presenter.scheduler_mut().next_fire().await else {
            break;
        };
        if let Some(value) = presenter.on_timer(id) {
            on_tick(value);
        }
    }
    presenter.displayed()
}
