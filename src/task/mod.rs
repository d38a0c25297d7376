pub mod challenge;
pub mod clear;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError};

use crate::utils::log_msg;

type TaskFn = Arc<dyn Fn(Arc<AtomicBool>) + Send + Sync>;

struct Slot {
    name: &'static str,
    run: TaskFn,
    restarts: u32,
    started_at: Instant,
    relaunch_due: Option<Instant>,
    handle: Option<thread::JoinHandle<()>>,
}

/// One-worker-per-slot supervisor. Every worker owns a slot and signals
/// completion by sending its name on the shared done channel; an exit
/// is answered with a relaunch after a bounded-rate backoff rather than
/// a tight restart loop. Workers honor the shared stop flag at their
/// state boundaries.
pub struct Supervisor {
    slots: Vec<Slot>,
    stop: Arc<AtomicBool>,
    min_backoff: Duration,
    max_backoff: Duration,
    healthy_run: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_backoff(
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(30),
        )
    }

    pub fn with_backoff(min_backoff: Duration, max_backoff: Duration, healthy_run: Duration) -> Self {
        Self {
            slots: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            min_backoff,
            max_backoff,
            healthy_run,
        }
    }

    pub fn register(&mut self, name: &'static str, run: TaskFn) {
        self.slots.push(Slot {
            name,
            run,
            restarts: 0,
            started_at: Instant::now(),
            relaunch_due: None,
            handle: None,
        });
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn spawn_slot(&mut self, idx: usize, done: &crossbeam_channel::Sender<&'static str>) {
        let slot = &mut self.slots[idx];
        slot.started_at = Instant::now();
        slot.relaunch_due = None;
        let run = Arc::clone(&slot.run);
        let stop = Arc::clone(&self.stop);
        let done = done.clone();
        let name = slot.name;
        slot.handle = Some(thread::spawn(move || {
            run(stop);
            let _ = done.send(name);
        }));
        log_msg("INFO", "SUPV", None, &format!("task '{}' launched", name));
    }

    fn backoff_for(&mut self, idx: usize) -> Duration {
        let healthy = self.healthy_run;
        let slot = &mut self.slots[idx];
        if slot.started_at.elapsed() >= healthy {
            slot.restarts = 0;
        } else {
            slot.restarts = slot.restarts.saturating_add(1);
        }
        let shift = slot.restarts.min(6);
        (self.min_backoff * 2u32.saturating_pow(shift)).min(self.max_backoff)
    }

    /// Runs until the stop flag is raised. Workers signalling completion
    /// are relaunched indefinitely; the subsystem itself never exits on
    /// a worker failure.
    pub fn run(&mut self) {
        let (done_tx, done_rx) = unbounded();
        for idx in 0..self.slots.len() {
            self.spawn_slot(idx, &done_tx);
        }
        loop {
            if self.stop.load(Ordering::SeqCst) {
                log_msg("INFO", "SUPV", None, "stop flag raised, draining workers");
                self.drain();
                return;
            }

            let now = Instant::now();
            for idx in 0..self.slots.len() {
                if matches!(self.slots[idx].relaunch_due, Some(due) if due <= now) {
                    self.spawn_slot(idx, &done_tx);
                }
            }

            match done_rx.recv_timeout(Duration::from_millis(200)) {
                Ok(name) => {
                    if self.stop.load(Ordering::SeqCst) {
                        continue;
                    }
                    if let Some(idx) = self.slots.iter().position(|s| s.name == name) {
                        let delay = self.backoff_for(idx);
                        self.slots[idx].relaunch_due = Some(Instant::now() + delay);
                        log_msg(
                            "WARN",
                            "SUPV",
                            None,
                            &format!("task '{}' exited, relaunch in {:?}", name, delay),
                        );
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Workers honor the stop flag at their state boundaries, so every
    /// join here is bounded: an in-flight submission finishes before
    /// its thread exits.
    fn drain(&mut self) {
        for slot in &mut self.slots {
            if let Some(handle) = slot.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn exited_tasks_are_relaunched_until_stopped() {
        let mut sup = Supervisor::with_backoff(
            Duration::from_millis(10),
            Duration::from_millis(50),
            Duration::from_secs(30),
        );
        let launches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&launches);
        sup.register(
            "flappy",
            Arc::new(move |_stop| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let stop = sup.stop_flag();
        let handle = thread::spawn(move || sup.run());
        thread::sleep(Duration::from_millis(400));
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(launches.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn quick_exits_back_off_progressively() {
        let mut sup = Supervisor::with_backoff(
            Duration::from_millis(10),
            Duration::from_millis(80),
            Duration::from_secs(30),
        );
        sup.register("noop", Arc::new(|_stop| {}));
        let first = sup.backoff_for(0);
        let second = sup.backoff_for(0);
        assert!(second > first);
        for _ in 0..10 {
            sup.backoff_for(0);
        }
        assert_eq!(sup.backoff_for(0), Duration::from_millis(80));
    }
}
