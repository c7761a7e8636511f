use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::app::subs::SubtitleEntry;

/// Sink for the text-injection primitive. The adb-backed implementation
/// lives in `app::adb::input`; tests substitute a recording fake.
pub trait Injector: Send {
    fn inject(&self, text: &str);
}

/// Pause/stop tokens for one automation run. Constructed per run, shared by
/// every device worker; the controlling thread flips them, workers poll.
#[derive(Debug, Default)]
pub struct PlaybackControl {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOptions {
    /// Entries with offsets strictly below this are skipped (seek).
    pub start_offset: Duration,
    /// Delay after each firing before the next countdown.
    pub settle: Duration,
    /// Pause/stop poll granularity.
    pub poll_interval: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_offset: Duration::ZERO,
            settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All remaining entries fired.
    Completed,
    /// The stop token was observed before the last entry fired.
    Stopped,
}

/// Returns the entries playback actually covers for a given start offset:
/// exactly those with `offset >= start`, in original order.
pub fn entries_from(entries: &[SubtitleEntry], start: Duration) -> Vec<SubtitleEntry> {
    entries
        .iter()
        .filter(|entry| entry.offset >= start)
        .cloned()
        .collect()
}

/// Runs one device's playback to the end or until stopped.
///
/// Waits are computed as `entry.offset - cursor`, where the cursor tracks the
/// last target offset (not measured elapsed time), so drift cannot accumulate
/// across entries. Pausing freezes the countdown; both tokens are observed
/// within one poll interval.
pub fn run_playback(
    serial: &str,
    entries: &[SubtitleEntry],
    injector: &dyn Injector,
    control: &PlaybackControl,
    options: &PlaybackOptions,
) -> PlaybackOutcome {
    let schedule = entries_from(entries, options.start_offset);
    info!(
        serial = %serial,
        total = entries.len(),
        scheduled = schedule.len(),
        start_offset_secs = options.start_offset.as_secs_f64(),
        "playback starting"
    );

    let mut cursor = options.start_offset;
    for entry in &schedule {
        let wait = entry.offset.saturating_sub(cursor);
        debug!(
            serial = %serial,
            target_secs = entry.offset.as_secs_f64(),
            wait_secs = wait.as_secs_f64(),
            "waiting for next entry"
        );
        if !countdown(wait, control, options.poll_interval) {
            info!(serial = %serial, "playback stopped");
            return PlaybackOutcome::Stopped;
        }

        injector.inject(&entry.text);
        debug!(serial = %serial, text = %entry.text, "entry fired");
        cursor = entry.offset;

        if !countdown(options.settle, control, options.poll_interval) {
            info!(serial = %serial, "playback stopped");
            return PlaybackOutcome::Stopped;
        }
    }

    info!(serial = %serial, fired = schedule.len(), "playback complete");
    PlaybackOutcome::Completed
}

/// Sleeps `duration` away in poll-interval slices. Pause freezes the
/// remaining time; returns false as soon as the stop token is observed.
fn countdown(duration: Duration, control: &PlaybackControl, poll_interval: Duration) -> bool {
    let mut remaining = duration;
    loop {
        if control.is_stopped() {
            return false;
        }
        if control.is_paused() {
            thread::sleep(poll_interval);
            continue;
        }
        if remaining.is_zero() {
            return true;
        }
        let slice = remaining.min(poll_interval);
        thread::sleep(slice);
        remaining -= slice;
    }
}

pub struct FleetWorker {
    pub serial: String,
    pub entries: Vec<SubtitleEntry>,
    pub injector: Box<dyn Injector>,
}

/// Spawns one playback thread per device. Workers share only the control
/// tokens; callers decide whether to join (console) or detach (background).
pub fn spawn_fleet(
    workers: Vec<FleetWorker>,
    control: Arc<PlaybackControl>,
    options: PlaybackOptions,
) -> Vec<JoinHandle<PlaybackOutcome>> {
    workers
        .into_iter()
        .map(|worker| {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                run_playback(
                    &worker.serial,
                    &worker.entries,
                    worker.injector.as_ref(),
                    &control,
                    &options,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    struct RecordingInjector {
        fired: Mutex<Vec<String>>,
    }

    impl RecordingInjector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fired: Mutex::new(Vec::new()),
            })
        }

        fn fired(&self) -> Vec<String> {
            self.fired.lock().expect("lock").clone()
        }
    }

    impl Injector for Arc<RecordingInjector> {
        fn inject(&self, text: &str) {
            self.fired.lock().expect("lock").push(text.to_string());
        }
    }

    fn entry(millis: u64, text: &str) -> SubtitleEntry {
        SubtitleEntry {
            offset: Duration::from_millis(millis),
            text: text.to_string(),
        }
    }

    fn fast_options() -> PlaybackOptions {
        PlaybackOptions {
            start_offset: Duration::ZERO,
            settle: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn seek_includes_exactly_entries_at_or_after_the_offset() {
        let entries = vec![
            entry(1_000, "a"),
            entry(2_000, "b"),
            entry(2_000, "c"),
            entry(5_000, "d"),
        ];
        let scheduled = entries_from(&entries, Duration::from_secs(2));
        let texts: Vec<&str> = scheduled.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);

        assert_eq!(entries_from(&entries, Duration::ZERO).len(), 4);
        assert!(entries_from(&entries, Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn stop_before_start_fires_nothing() {
        let injector = RecordingInjector::new();
        let control = PlaybackControl::new();
        control.stop();
        let outcome = run_playback(
            "test-device",
            &[entry(10, "hello")],
            &injector,
            &control,
            &fast_options(),
        );
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert!(injector.fired().is_empty());
    }

    #[test]
    fn single_entry_fires_once_after_its_offset() {
        let injector = RecordingInjector::new();
        let control = PlaybackControl::new();
        let start = Instant::now();
        let outcome = run_playback(
            "test-device",
            &[entry(40, "hello")],
            &injector,
            &control,
            &fast_options(),
        );
        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(injector.fired(), vec!["hello".to_string()]);
    }

    #[test]
    fn entries_fire_in_offset_order() {
        let injector = RecordingInjector::new();
        let control = PlaybackControl::new();
        let outcome = run_playback(
            "test-device",
            &[entry(10, "one"), entry(20, "two"), entry(30, "three")],
            &injector,
            &control,
            &fast_options(),
        );
        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert_eq!(
            injector.fired(),
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn seek_skips_earlier_entries_entirely() {
        let injector = RecordingInjector::new();
        let control = PlaybackControl::new();
        let mut options = fast_options();
        options.start_offset = Duration::from_millis(25);
        let outcome = run_playback(
            "test-device",
            &[entry(10, "early"), entry(30, "late")],
            &injector,
            &control,
            &options,
        );
        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert_eq!(injector.fired(), vec!["late".to_string()]);
    }

    #[test]
    fn pause_freezes_the_countdown_until_resume() {
        let injector = RecordingInjector::new();
        let control = Arc::new(PlaybackControl::new());
        control.pause();

        let worker_injector = Arc::clone(&injector);
        let worker_control = Arc::clone(&control);
        let handle = thread::spawn(move || {
            run_playback(
                "test-device",
                &[entry(20, "held")],
                &worker_injector,
                &worker_control,
                &fast_options(),
            )
        });

        // Well past the entry's offset, still paused: nothing may fire.
        thread::sleep(Duration::from_millis(80));
        assert!(injector.fired().is_empty());

        control.resume();
        let outcome = handle.join().expect("join");
        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert_eq!(injector.fired(), vec!["held".to_string()]);
    }

    #[test]
    fn stop_during_settle_prevents_later_entries() {
        let injector = RecordingInjector::new();
        let control = Arc::new(PlaybackControl::new());
        let mut options = fast_options();
        options.settle = Duration::from_millis(50);

        let worker_injector = Arc::clone(&injector);
        let worker_control = Arc::clone(&control);
        let handle = thread::spawn(move || {
            run_playback(
                "test-device",
                &[entry(5, "first"), entry(500, "second")],
                &worker_injector,
                &worker_control,
                &options,
            )
        });

        thread::sleep(Duration::from_millis(30));
        control.stop();
        let outcome = handle.join().expect("join");
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert_eq!(injector.fired(), vec!["first".to_string()]);
    }

    #[test]
    fn fleet_runs_each_device_independently() {
        let first = RecordingInjector::new();
        let second = RecordingInjector::new();
        let control = Arc::new(PlaybackControl::new());
        let workers = vec![
            FleetWorker {
                serial: "device-a".to_string(),
                entries: vec![entry(5, "a1"), entry(10, "a2")],
                injector: Box::new(Arc::clone(&first)),
            },
            FleetWorker {
                serial: "device-b".to_string(),
                entries: vec![entry(5, "b1")],
                injector: Box::new(Arc::clone(&second)),
            },
        ];
        let handles = spawn_fleet(workers, Arc::clone(&control), fast_options());
        for handle in handles {
            assert_eq!(handle.join().expect("join"), PlaybackOutcome::Completed);
        }
        assert_eq!(first.fired(), vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(second.fired(), vec!["b1".to_string()]);
    }
}
