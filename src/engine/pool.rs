//! Two-gate barrier for the worker pool: a "start" gate that releases
//! workers into a phase, and a "done" gate that releases the main
//! thread once every worker has finished it.
//!
//! This is the safe, condvar-based equivalent of a raw futex counter
//! pair: `started`/`finished` counts play the role of atomic phase
//! counters, and `going` is the cooperative shutdown flag workers check
//! between phases. `epoch` increments on every phase transition (twice
//! per generation — once for alive-expansion, once for cell-resolution)
//! so a worker's wake condition can't miss a transition into the same
//! phase variant back to back.

use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Alive-expansion: scatter neighbour contributions into the hash.
    AliveExpansion,
    /// Cell-resolution: classify accumulated values into next-gen alive sets.
    CellResolution,
}

struct GateState {
    epoch: u64,
    phase: Phase,
    going: bool,
    started: u32,
    finished: u32,
    worker_count: u32,
}

pub struct Gate {
    state: Mutex<GateState>,
    start_cv: Condvar,
    done_cv: Condvar,
}

impl Gate {
    pub fn new(worker_count: u32) -> Self {
        Gate {
            state: Mutex::new(GateState {
                epoch: 0,
                phase: Phase::AliveExpansion,
                going: true,
                started: 0,
                finished: 0,
                worker_count,
            }),
            start_cv: Condvar::new(),
            done_cv: Condvar::new(),
        }
    }

    /// Main-thread call: release all workers into `phase` and block
    /// until every one of them reports back finished.
    pub fn run_phase(&self, phase: Phase) {
        {
            let mut s = self.state.lock();
            s.epoch += 1;
            s.phase = phase;
            s.started = 0;
            s.finished = 0;
        }
        self.start_cv.notify_all();

        let mut s = self.state.lock();
        while s.finished < s.worker_count {
            self.done_cv.wait(&mut s);
        }
    }

    /// Tell every parked worker to exit instead of waiting for the next phase.
    pub fn shut_down(&self) {
        {
            let mut s = self.state.lock();
            s.going = false;
        }
        self.start_cv.notify_all();
    }

    /// Worker-thread call: park until the main thread opens the next
    /// phase (or shutdown), returning `None` on shutdown. `last_epoch`
    /// is whatever this worker last observed (0 before its first call).
    pub fn wait_for_phase(&self, last_epoch: u64) -> Option<(u64, Phase)> {
        let mut s = self.state.lock();
        while s.going && s.epoch == last_epoch {
            self.start_cv.wait(&mut s);
        }
        if !s.going {
            return None;
        }
        s.started += 1;
        Some((s.epoch, s.phase))
    }

    /// Worker-thread call: report this phase complete.
    pub fn finish_phase(&self) {
        let mut s = self.state.lock();
        s.finished += 1;
        if s.finished >= s.worker_count {
            self.done_cv.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_worker_round_trips_both_phases() {
        let gate = Arc::new(Gate::new(1));
        let worker_gate = Arc::clone(&gate);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker_seen = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            let mut last = 0;
            loop {
                match worker_gate.wait_for_phase(last) {
                    Some((epoch, phase)) => {
                        last = epoch;
                        worker_seen.lock().push(phase);
                        worker_gate.finish_phase();
                    }
                    None => break,
                }
            }
        });

        gate.run_phase(Phase::AliveExpansion);
        gate.run_phase(Phase::CellResolution);
        gate.shut_down();
        handle.join().unwrap();

        assert_eq!(*seen.lock(), vec![Phase::AliveExpansion, Phase::CellResolution]);
    }
}
