//! Fixed-interval update timer.
//!
//! The timer runs on its own thread but never touches session state: it
//! only posts [`Tick`]s onto the session's channel. Each start bumps a
//! generation number, and ticks from a cancelled timer that are still
//! queued are recognised as stale by [`UpdateScheduler::is_current`].

use crossbeam_channel::{select, tick, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Generation of the timer that produced this tick.
    pub generation: u64,
}

struct TimerHandle {
    /// Dropping this sender stops the timer thread.
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
    period: Duration,
}

/// Repeating timer with at most one live instance.
pub struct UpdateScheduler {
    tick_tx: Sender<Tick>,
    generation: u64,
    timer: Option<TimerHandle>,
}

impl UpdateScheduler {
    /// Create a stopped scheduler that will post ticks to `tick_tx`.
    pub fn new(tick_tx: Sender<Tick>) -> Self {
        Self {
            tick_tx,
            generation: 0,
            timer: None,
        }
    }

    /// Start ticking every `period`, cancelling any running timer first.
    pub fn start(&mut self, period: Duration) {
        self.stop();
        self.generation += 1;

        let generation = self.generation;
        let tick_tx = self.tick_tx.clone();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name(format!("tablelink-timer-{}", generation))
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if tick_tx.send(Tick { generation }).is_err() {
                                break;
                            }
                        }
                    }
                }
                log::trace!("[SCHEDULER] Timer {} exited", generation);
            });

        match thread {
            Ok(thread) => {
                log::debug!(
                    "[SCHEDULER] Started timer {} with period {:?}",
                    generation,
                    period
                );
                self.timer = Some(TimerHandle {
                    stop_tx,
                    thread,
                    period,
                });
            }
            Err(e) => log::error!("[SCHEDULER] Failed to spawn timer thread: {}", e),
        }
    }

    /// Cancel the running timer, if any, and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            drop(timer.stop_tx);
            if timer.thread.join().is_err() {
                log::error!("[SCHEDULER] Timer thread panicked");
            }
            log::debug!("[SCHEDULER] Stopped timer {}", self.generation);
        }
    }

    /// Check if a timer is running.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Period of the running timer.
    pub fn period(&self) -> Option<Duration> {
        self.timer.as_ref().map(|t| t.period)
    }

    /// Generation of the most recently started timer.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if a tick comes from the running timer.
    pub fn is_current(&self, tick: &Tick) -> bool {
        self.is_running() && tick.generation == self.generation
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("generation", &self.generation)
            .field("period", &self.period())
            .finish_non_exhaustive()
    }
}
