//! Slideshow state machine and background worker loop.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use thiserror::Error;

use crate::danbooru::{Candidate, FetchError, Rating};
use crate::filter;
use crate::staging::{self, StagedImage, StagingStore};
use crate::wallpaper::WallpaperApplier;

/// Upper bound for the random page drawn each cycle.
const MAX_PAGE: u32 = 200;
/// Granularity at which timed waits re-check the slideshow state.
const WAIT_TICK: Duration = Duration::from_secs(1);
/// Delay before retrying after an empty page or a rejected apply.
const RETRY_DELAY: Duration = Duration::from_secs(5);
/// Backoff after network, HTTP, or unexpected errors.
const ERROR_BACKOFF: Duration = Duration::from_secs(30);
/// Bound on how long `stop` waits for the worker to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Search parameters for one running session. Immutable while the
/// slideshow runs.
#[derive(Debug, Clone)]
pub struct Query {
    pub tags: Vec<String>,
    pub rating: Rating,
    pub interval_secs: u64,
}

impl Query {
    /// Tag string sent to the posts endpoint, rating constraint appended.
    pub fn search_tags(&self) -> String {
        format!("{} rating:{}", self.tags.join(" "), self.rating.as_str())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowState {
    Stopped,
    Running,
    Paused,
}

/// Catalog lookup the loop drives once per cycle.
pub trait ImageSource: Send + Sync {
    fn fetch_candidates(&self, query: &Query, page: u32) -> Result<Vec<Candidate>, FetchError>;
}

/// Binary download of a chosen candidate.
pub trait Fetcher: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// State shared between the controller and the worker thread. The worker
/// is the sole writer of `status` and `current`; the state enum is
/// written only through the controller's public operations.
struct Shared {
    state: Mutex<SlideshowState>,
    signal: Condvar,
    status: Mutex<String>,
    current: Mutex<Option<StagedImage>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlideshowState::Stopped),
            signal: Condvar::new(),
            status: Mutex::new(String::from("Ready.")),
            current: Mutex::new(None),
        }
    }

    fn set_status(&self, message: impl Into<String>) {
        *self.status.lock().unwrap() = message.into();
    }
}

struct WorkerHandle {
    join: thread::JoinHandle<()>,
    done_rx: Receiver<()>,
}

/// Drives the fetch/filter/download/apply loop on a background thread and
/// owns every state transition.
pub struct SlideshowController {
    source: Arc<dyn ImageSource>,
    fetcher: Arc<dyn Fetcher>,
    applier: Arc<dyn WallpaperApplier>,
    staging: StagingStore,
    shared: Arc<Shared>,
    worker: Option<WorkerHandle>,
}

impl SlideshowController {
    pub fn new(
        source: Arc<dyn ImageSource>,
        fetcher: Arc<dyn Fetcher>,
        applier: Arc<dyn WallpaperApplier>,
        staging: StagingStore,
    ) -> Self {
        Self {
            source,
            fetcher,
            applier,
            staging,
            shared: Arc::new(Shared::new()),
            worker: None,
        }
    }

    /// Adopt a staged file left by a previous run so save actions work
    /// before the first download.
    pub fn recover_previous(&self) -> Option<PathBuf> {
        let existing = self.staging.find_existing()?;
        let path = existing.local_path.clone();
        *self.shared.current.lock().unwrap() = Some(existing);
        self.shared.set_status("Found wallpaper from last session.");
        Some(path)
    }

    /// Begin a slideshow session. Ignored unless the controller is
    /// currently stopped.
    pub fn start(&mut self, query: Query) {
        if self.state() != SlideshowState::Stopped {
            return;
        }
        if !self.reap_worker() {
            // A worker detached by a timed-out stop must fully exit
            // before a new session may begin.
            self.shared.set_status("Still stopping the previous session...");
            return;
        }
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != SlideshowState::Stopped {
                return;
            }
            *state = SlideshowState::Running;
        }

        let (done_tx, done_rx) = mpsc::channel();
        let ctx = WorkerCtx {
            source: Arc::clone(&self.source),
            fetcher: Arc::clone(&self.fetcher),
            applier: Arc::clone(&self.applier),
            staging: self.staging.clone(),
            shared: Arc::clone(&self.shared),
        };
        let join = thread::spawn(move || {
            run_worker(ctx, query);
            drop(done_tx);
        });
        self.worker = Some(WorkerHandle { join, done_rx });
        self.shared.set_status("Slideshow started...");
    }

    /// Suspend the loop at its next check point. Ignored unless running.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state != SlideshowState::Running {
            return;
        }
        *state = SlideshowState::Paused;
        drop(state);
        self.shared.signal.notify_all();
        self.shared.set_status("Paused. Waiting for resume...");
    }

    /// Continue a paused loop immediately. Ignored unless paused.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state != SlideshowState::Paused {
            return;
        }
        *state = SlideshowState::Running;
        drop(state);
        self.shared.signal.notify_all();
        self.shared.set_status("Resumed. Fetching next wallpaper...");
    }

    /// End the session. The worker is woken at whatever suspension point
    /// it sits in and joined with a bounded timeout; calling this while
    /// already stopped is a no-op.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state == SlideshowState::Stopped && self.worker.is_none() {
                return;
            }
            *state = SlideshowState::Stopped;
        }
        self.shared.signal.notify_all();

        if let Some(worker) = self.worker.take() {
            match worker.done_rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = worker.join.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Likely blocked in a network call; it observes the
                    // stop at its next check point. Keep the handle so a
                    // later start can reap it.
                    self.worker = Some(worker);
                }
            }
        }
        self.shared.set_status("Slideshow stopped.");
    }

    pub fn state(&self) -> SlideshowState {
        *self.shared.state.lock().unwrap()
    }

    /// Latest one-line progress text written by the loop.
    pub fn status(&self) -> String {
        self.shared.status.lock().unwrap().clone()
    }

    pub fn current_image(&self) -> Option<StagedImage> {
        self.shared.current.lock().unwrap().clone()
    }

    pub fn current_image_path(&self) -> Option<PathBuf> {
        self.current_image().map(|image| image.local_path)
    }

    /// Copy the current wallpaper to the persistent save folder.
    pub fn save_current(&self) -> Result<PathBuf> {
        let current = self
            .current_image()
            .ok_or_else(|| anyhow::anyhow!("no wallpaper has been set yet"))?;
        self.staging.save_copy(&current)
    }

    /// Join a worker that has already exited. Returns false while a
    /// previous worker is still winding down.
    fn reap_worker(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        match worker.done_rx.try_recv() {
            Err(TryRecvError::Empty) => {
                self.worker = Some(worker);
                false
            }
            Ok(()) | Err(TryRecvError::Disconnected) => {
                let _ = worker.join.join();
                true
            }
        }
    }
}

impl Drop for SlideshowController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerCtx {
    source: Arc<dyn ImageSource>,
    fetcher: Arc<dyn Fetcher>,
    applier: Arc<dyn WallpaperApplier>,
    staging: StagingStore,
    shared: Arc<Shared>,
}

enum CycleOutcome {
    Applied,
    NoCandidates,
    ApplyRejected,
    Cancelled,
}

#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CycleError {
    fn status_line(&self) -> String {
        match self {
            CycleError::Fetch(FetchError::Http(code)) => format!("HTTP error {code}. Retrying..."),
            CycleError::Fetch(FetchError::Network(_)) => {
                String::from("Network error. Check connection. Retrying...")
            }
            CycleError::Other(err) => format!("Unexpected error: {err:#}. Retrying..."),
        }
    }
}

fn run_worker(ctx: WorkerCtx, query: Query) {
    let mut rng = ChaChaRng::from_entropy();
    let mut previous: Option<PathBuf> = None;
    let interval = query.interval();

    loop {
        if pause_gate(&ctx.shared) {
            break;
        }

        let delay = match run_cycle(&ctx, &query, &mut rng, &mut previous) {
            Ok(CycleOutcome::Applied) => interval,
            Ok(CycleOutcome::NoCandidates) => {
                ctx.shared
                    .set_status("No suitable images found on this page. Retrying...");
                RETRY_DELAY
            }
            Ok(CycleOutcome::ApplyRejected) => {
                ctx.shared.set_status("Failed to set the wallpaper. Retrying...");
                RETRY_DELAY
            }
            Ok(CycleOutcome::Cancelled) => break,
            Err(err) => {
                tracing::debug!("cycle failed: {err:#}");
                ctx.shared.set_status(err.status_line());
                ERROR_BACKOFF
            }
        };

        if wait_for(&ctx.shared, delay) {
            break;
        }
    }
}

fn run_cycle(
    ctx: &WorkerCtx,
    query: &Query,
    rng: &mut ChaChaRng,
    previous: &mut Option<PathBuf>,
) -> Result<CycleOutcome, CycleError> {
    ctx.shared.set_status("Fetching new image list...");
    let page = rng.gen_range(1..=MAX_PAGE);
    let candidates = ctx.source.fetch_candidates(query, page)?;
    if stopped(&ctx.shared) {
        return Ok(CycleOutcome::Cancelled);
    }

    let suitable = filter::suitable(candidates);
    let Some(chosen) = filter::pick(&suitable, rng) else {
        return Ok(CycleOutcome::NoCandidates);
    };
    // The filter only passes candidates carrying a file URL and extension.
    let (Some(file_url), Some(file_ext)) = (chosen.file_url.as_deref(), chosen.file_ext.as_deref())
    else {
        return Ok(CycleOutcome::NoCandidates);
    };

    ctx.shared.set_status(format!(
        "Downloading: {}",
        staging::file_name_from_url(file_url).unwrap_or(file_url)
    ));
    let bytes = ctx.fetcher.download(file_url)?;
    if stopped(&ctx.shared) {
        return Ok(CycleOutcome::Cancelled);
    }

    let staged_path = ctx.staging.stage(chosen.id, file_ext, &bytes)?;
    if !ctx.applier.apply(&staged_path) {
        ctx.staging.retire(&staged_path);
        return Ok(CycleOutcome::ApplyRejected);
    }

    let post_url = chosen.post_url();
    ctx.shared.set_status(format!("Wallpaper set! Source: {post_url}"));
    *ctx.shared.current.lock().unwrap() = Some(StagedImage {
        local_path: staged_path.clone(),
        source_url: Some(file_url.to_owned()),
        post_url: Some(post_url),
    });

    // The old file goes only after the new one is confirmed applied.
    if let Some(old) = previous.take() {
        if old != staged_path {
            ctx.staging.retire(&old);
        }
    }
    *previous = Some(staged_path);

    Ok(CycleOutcome::Applied)
}

fn stopped(shared: &Shared) -> bool {
    *shared.state.lock().unwrap() == SlideshowState::Stopped
}

/// Block while paused. Returns true when the slideshow was stopped.
fn pause_gate(shared: &Shared) -> bool {
    let mut state = shared.state.lock().unwrap();
    while *state == SlideshowState::Paused {
        state = shared.signal.wait(state).unwrap();
    }
    *state == SlideshowState::Stopped
}

/// Wait out a delay in one-second steps, re-checking the slideshow state
/// at each step. Paused time does not count against the delay; resuming
/// continues the remaining wait. Returns true when the slideshow was
/// stopped.
fn wait_for(shared: &Shared, delay: Duration) -> bool {
    let mut remaining = delay;
    let mut state = shared.state.lock().unwrap();
    loop {
        match *state {
            SlideshowState::Stopped => return true,
            SlideshowState::Paused => {
                state = shared.signal.wait(state).unwrap();
            }
            SlideshowState::Running => {
                if remaining.is_zero() {
                    return false;
                }
                let step = WAIT_TICK.min(remaining);
                let (guard, timeout) = shared.signal.wait_timeout(state, step).unwrap();
                state = guard;
                if timeout.timed_out() {
                    remaining = remaining.saturating_sub(step);
                }
            }
        }
    }
}
