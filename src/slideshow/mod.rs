//! Slideshow loop
//!
//! One cycle reads the active photos, picks one, loads its prepared artifact
//! and refreshes the panel with GC16. Settings are read from the catalog on
//! every cycle so changes apply without a restart.
//!
//! | Cycle result      | Next wait                  |
//! |-------------------|----------------------------|
//! | photo displayed   | display duration           |
//! | empty library     | display duration           |
//! | artifact missing  | none, photo marked inactive |
//! | any error         | backoff                    |
//!
//! An empty library clears the panel once. Later empty cycles leave the
//! white panel alone until a photo has been shown again.
//!
//! The loop never gives up. Consecutive failures are only counted for logging.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::artifact::ArtifactStore;
use crate::catalog::{self, Catalog, Ordering, Photo, PhotoId};
use crate::error::{Error, Result};
use crate::it8951::{RefreshMode, Vcom};

pub mod panel;
pub mod signal;

pub use panel::Panel;
pub use signal::StopSignal;

/// Cadence of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideshowTiming {
    /// Used when the catalog has no usable duration setting
    pub default_display: Duration,
    /// Floor for the catalog's duration setting
    pub min_display: Duration,
    /// Wait after a failed cycle
    pub backoff: Duration,
}

impl Default for SlideshowTiming {
    fn default() -> Self {
        Self {
            default_display: Duration::from_secs(300),
            min_display: Duration::from_secs(60),
            backoff: Duration::from_secs(30),
        }
    }
}

/// How a cycle ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Displayed { id: PhotoId },
    EmptyLibrary,
    /// The artifact was gone and the photo got deactivated
    ArtifactMissing { id: PhotoId },
}

/// The photo chosen for this cycle and where its artifact should be.
///
/// `artifact` is already resolved against the store root, for logging.
/// Loading goes through `photo.processed_path` so the root is joined once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDecision {
    pub photo: Photo,
    pub artifact: PathBuf,
}

/// Consecutive failed cycles since the last good one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub consecutive_failures: u32,
}

impl RetryState {
    fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            log::info!(
                "Cycle succeeded after {} failed attempts",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

/// Pick the next photo.
///
/// Sequential order takes the never-shown photos first, then the oldest
/// `last_displayed`, then the lowest `display_count`, then the lowest id.
pub fn select<'a, R: Rng + ?Sized>(
    photos: &'a [Photo],
    ordering: Ordering,
    rng: &mut R,
) -> Option<&'a Photo> {
    match ordering {
        Ordering::Random => photos.choose(rng),
        Ordering::Sequential => photos
            .iter()
            .min_by_key(|photo| (photo.last_displayed, photo.display_count, photo.id)),
    }
}

/// Supervised display loop over a panel and a catalog.
pub struct Slideshow<P, C> {
    panel: P,
    catalog: C,
    artifacts: ArtifactStore,
    vcom: Vcom,
    timing: SlideshowTiming,
    rng: StdRng,
    retry: RetryState,
    /// Set once an empty library was cleared, reset by the next displayed photo
    showing_blank: bool,
    stop: Arc<StopSignal>,
}

impl<P: Panel, C: Catalog> Slideshow<P, C> {
    pub fn new(
        panel: P,
        catalog: C,
        artifacts: ArtifactStore,
        vcom: Vcom,
        timing: SlideshowTiming,
    ) -> Self {
        Self {
            panel,
            catalog,
            artifacts,
            vcom,
            timing,
            rng: StdRng::from_entropy(),
            retry: RetryState::default(),
            showing_blank: false,
            stop: Arc::new(StopSignal::new()),
        }
    }

    /// Replace the random source, for reproducible ordering.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn stop_signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    /// Bring the panel up. On failure the panel is shut down to release its handles.
    pub fn initialize(&mut self) -> Result<()> {
        let geometry = self.artifacts.geometry();
        if let Err(e) = self.panel.initialize(geometry, self.vcom) {
            log::error!("Panel failed to start: {}", e);
            self.panel.shutdown();
            return Err(e);
        }
        Ok(())
    }

    fn decide(&mut self, photos: &[Photo]) -> Option<DisplayDecision> {
        let ordering = catalog::ordering(&self.catalog);
        let photo = select(photos, ordering, &mut self.rng)?.clone();
        log::debug!("Selected photo {} ({:?}) with {:?} ordering", photo.id, photo.name, ordering);
        let artifact = self.artifacts.resolve(&photo.processed_path);
        Some(DisplayDecision { photo, artifact })
    }

    /// One pass of the loop, without the wait that follows it.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let photos = self.catalog.list_active_photos()?;

        let Some(decision) = self.decide(&photos) else {
            if self.showing_blank {
                log::debug!("Library still empty");
            } else {
                log::info!("No active photos, clearing panel");
                self.panel.clear()?;
                self.showing_blank = true;
            }
            return Ok(CycleOutcome::EmptyLibrary);
        };

        let id = decision.photo.id;
        let frame = match self.artifacts.load(&decision.photo.processed_path) {
            Ok(frame) => frame,
            Err(Error::MissingArtifact(path)) => {
                log::warn!(
                    "Artifact {} for photo {} is missing, deactivating it",
                    path.display(),
                    id
                );
                self.catalog.mark_inactive(id)?;
                return Ok(CycleOutcome::ArtifactMissing { id });
            }
            Err(e) => return Err(e),
        };

        self.panel.load_frame(&frame)?;
        self.panel
            .refresh_area(self.artifacts.geometry().full_area(), RefreshMode::Gc16)?;
        self.showing_blank = false;
        log::info!("Displaying photo {} ({:?})", id, decision.photo.name);

        if let Err(e) = self.catalog.record_display(id, Utc::now()) {
            log::warn!("Could not record display of photo {}: {}", id, e);
        }
        Ok(CycleOutcome::Displayed { id })
    }

    /// Update the retry state and decide how long to wait before the next cycle.
    pub fn next_wait(&mut self, result: &Result<CycleOutcome>) -> Duration {
        match result {
            Ok(CycleOutcome::ArtifactMissing { .. }) => {
                self.retry.record_success();
                Duration::ZERO
            }
            Ok(_) => {
                self.retry.record_success();
                catalog::display_duration(&self.catalog, &self.timing)
            }
            Err(e) => {
                self.retry.record_failure();
                if e.is_contract_violation() {
                    log::error!("Frame contract violated: {}", e);
                } else {
                    log::warn!(
                        "Cycle failed ({} in a row): {}",
                        self.retry.consecutive_failures,
                        e
                    );
                }
                self.timing.backoff
            }
        }
    }

    /// Run cycles until stopped, then shut the panel down.
    ///
    /// Expects an initialized panel.
    pub fn run(&mut self) {
        log::info!("Slideshow running");
        while !self.stop.is_stopped() {
            let result = self.run_cycle();
            let wait = self.next_wait(&result);
            if !wait.is_zero() {
                log::debug!("Next cycle in {} s", wait.as_secs());
            }
            if self.stop.wait_timeout(wait) {
                break;
            }
        }
        log::info!("Slideshow stopping");
        self.panel.shutdown();
    }
}

impl<P, C> Slideshow<P, C>
where
    P: Panel + Send + 'static,
    C: Catalog + Send + 'static,
{
    /// Initialize the panel here, then run the loop on a worker thread.
    pub fn start(mut self) -> Result<SlideshowHandle> {
        self.initialize()?;
        let stop = self.stop_signal();
        let worker = thread::Builder::new()
            .name("slideshow".to_string())
            .spawn(move || self.run())?;
        Ok(SlideshowHandle {
            stop,
            worker: Some(worker),
        })
    }
}

/// Control over a started slideshow. Dropping it stops the slideshow.
pub struct SlideshowHandle {
    stop: Arc<StopSignal>,
    worker: Option<JoinHandle<()>>,
}

impl SlideshowHandle {
    /// Signal used by [`Self::stop`], for wiring into process signal handlers.
    pub fn stop_signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Interrupt the wait between cycles and join the worker.
    ///
    /// A refresh in flight completes first. The panel is shut down on exit.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.join();
    }

    /// Block until the worker ends, which only happens after a stop request.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Slideshow worker panicked");
            }
        }
    }
}

impl Drop for SlideshowHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
