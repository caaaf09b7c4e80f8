use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::detection::domain::detection_dispatch::{
    DetectionDispatch, DetectionOutcome, DetectionRequest, SubmitRejected,
};
use crate::detection::domain::detection_service::DetectionService;

/// Runs a [`DetectionService`] on a dedicated worker thread.
///
/// Layout: `render thread → jobs → worker [detect] → outcomes → render thread`
///
/// At most `max_in_flight` requests are queued, running or resolved but not
/// yet drained; submissions beyond that are rejected as busy rather than
/// queued.
pub struct ThreadedDetectionDispatch {
    job_tx: Option<Sender<DetectionRequest>>,
    outcome_rx: Receiver<DetectionOutcome>,
    handle: Option<thread::JoinHandle<()>>,
    max_in_flight: usize,
    in_flight: usize,
}

impl ThreadedDetectionDispatch {
    pub fn spawn(service: Box<dyn DetectionService>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectionRequest>(max_in_flight);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<DetectionOutcome>();

        let handle = spawn_worker(service, job_rx, outcome_tx);

        Self {
            job_tx: Some(job_tx),
            outcome_rx,
            handle: Some(handle),
            max_in_flight,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

fn spawn_worker(
    mut service: Box<dyn DetectionService>,
    job_rx: Receiver<DetectionRequest>,
    outcome_tx: Sender<DetectionOutcome>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for request in job_rx {
            let started = Instant::now();
            let result = service.detect(&request.frame);
            let outcome = DetectionOutcome {
                generation: request.generation,
                frame_index: request.frame.index(),
                result,
                elapsed: started.elapsed(),
            };
            if outcome_tx.send(outcome).is_err() {
                break;
            }
        }
    })
}

impl DetectionDispatch for ThreadedDetectionDispatch {
    fn submit(&mut self, request: DetectionRequest) -> Result<(), SubmitRejected> {
        if self.in_flight >= self.max_in_flight {
            return Err(SubmitRejected::Busy);
        }
        let Some(job_tx) = self.job_tx.as_ref() else {
            return Err(SubmitRejected::Disconnected);
        };
        match job_tx.try_send(request) {
            Ok(()) => {
                self.in_flight += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SubmitRejected::Busy),
            Err(TrySendError::Disconnected(_)) => Err(SubmitRejected::Disconnected),
        }
    }

    fn completed(&mut self) -> Vec<DetectionOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Worker is gone; nothing it held will ever resolve.
                    self.in_flight = 0;
                    break;
                }
            }
        }
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }
}

impl Drop for ThreadedDetectionDispatch {
    fn drop(&mut self) {
        drop(self.job_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Detection worker panicked");
            }
        }
    }
}

/// Waits up to `timeout` for at least `count` outcomes in total.
#[cfg(test)]
pub(crate) fn drain_for(
    dispatch: &mut dyn DetectionDispatch,
    count: usize,
    timeout: std::time::Duration,
) -> Vec<DetectionOutcome> {
    let deadline = Instant::now() + timeout;
    let mut outcomes = Vec::new();
    while outcomes.len() < count && Instant::now() < deadline {
        outcomes.extend(dispatch.completed());
        thread::sleep(std::time::Duration::from_millis(2));
    }
    outcomes
}
