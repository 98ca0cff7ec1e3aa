/// Background station-list fetches.
///
/// At most one fetch is outstanding at a time. A request made while one is
/// in flight is dropped, not queued. The foreground loop observes completion
/// with a non-blocking `poll`; a result is handed over exactly once and the
/// worker becomes idle again only after it has been collected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Mutex;

use threadpool::ThreadPool;

use crate::model::{AqError, Station};

pub type StationFetchResult = Result<Vec<Station>, AqError>;

pub struct StationFetchWorker {
    pool: ThreadPool,
    in_flight: AtomicBool,
    pending: Mutex<Option<Receiver<StationFetchResult>>>,
}

impl Default for StationFetchWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl StationFetchWorker {
    /// One pool thread: only one fetch is ever in flight.
    pub fn new() -> Self {
        Self {
            pool: ThreadPool::with_name("station-fetch".to_string(), 1),
            in_flight: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// True while a fetch is running or its result has not been polled yet.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Dispatches `job` to the pool. Returns `false`, without running `job`,
    /// when a fetch is already outstanding.
    pub fn request<F>(&self, job: F) -> bool
    where
        F: FnOnce() -> StationFetchResult + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Station fetch already in flight, request dropped");
            return false;
        }

        let (tx, rx) = mpsc::sync_channel(1);
        *self.lock_pending() = Some(rx);

        self.pool.execute(move || {
            let result = job();
            // The receiver only goes away with the worker itself.
            let _ = tx.send(result);
        });
        true
    }

    /// Non-blocking check for a finished fetch.
    pub fn poll(&self) -> Option<StationFetchResult> {
        let mut pending = self.lock_pending();
        let outcome = match pending.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                tracing::error!("Station fetch job ended without a result");
                Err(AqError::Transport("station fetch job ended without a result".to_string()))
            }
        };

        *pending = None;
        self.in_flight.store(false, Ordering::Release);
        Some(outcome)
    }

    /// Blocks until the pool has no running jobs. Results still need `poll`.
    pub fn wait_idle(&self) {
        self.pool.join();
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<Receiver<StationFetchResult>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoDataKind;
    use std::sync::mpsc::channel;

    fn station(id: i64) -> Station {
        Station { id, ..Station::default() }
    }

    #[test]
    fn test_poll_without_request_is_none() {
        let worker = StationFetchWorker::new();
        assert!(worker.poll().is_none());
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_second_request_is_dropped_while_in_flight() {
        let worker = StationFetchWorker::new();
        let (release_tx, release_rx) = channel::<()>();

        assert!(worker.request(move || {
            release_rx.recv().ok();
            Ok(vec![station(1)])
        }));
        assert!(worker.is_busy());
        assert!(!worker.request(|| panic!("dropped request must not run")));
        assert!(worker.poll().is_none(), "first fetch is still blocked");

        release_tx.send(()).unwrap();
        worker.wait_idle();

        let result = worker.poll().expect("fetch finished");
        assert_eq!(result.unwrap()[0].id, 1);
        assert!(!worker.is_busy());
        assert!(worker.poll().is_none(), "a result is delivered once");
    }

    #[test]
    fn test_worker_accepts_new_request_after_result_is_collected() {
        let worker = StationFetchWorker::new();

        assert!(worker.request(|| Err(AqError::NoDataFound(NoDataKind::Stations))));
        worker.wait_idle();
        assert!(!worker.request(|| Ok(Vec::new())), "result not collected yet");

        assert!(matches!(worker.poll(), Some(Err(AqError::NoDataFound(_)))));
        assert!(worker.request(|| Ok(vec![station(2), station(3)])));
        worker.wait_idle();
        assert_eq!(worker.poll().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_panicking_job_releases_the_guard() {
        let worker = StationFetchWorker::new();
        assert!(worker.request(|| panic!("transport blew up")));
        worker.wait_idle();

        assert!(matches!(worker.poll(), Some(Err(AqError::Transport(_)))));
        assert!(!worker.is_busy());
    }
}
