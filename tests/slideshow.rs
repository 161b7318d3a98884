//! End-to-end slideshow cycles against a recording panel, the in-memory
//! catalog and artifacts written to a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mainichi_shashin::artifact::ArtifactStore;
use mainichi_shashin::catalog::{
    Catalog, MemoryCatalog, Photo, PhotoId, DISPLAY_DURATION_SECONDS, ENABLE_RANDOM_ORDER,
};
use mainichi_shashin::it8951::{RefreshMode, Vcom};
use mainichi_shashin::slideshow::{CycleOutcome, Panel, Slideshow, SlideshowTiming};
use mainichi_shashin::{Area, Error, FrameBuffer, PanelGeometry, Result};

const GEOMETRY: PanelGeometry = PanelGeometry::new(12, 8);

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Initialize(PanelGeometry, Vcom),
    Load(Vec<u8>),
    Refresh(Area, RefreshMode),
    Clear,
    Shutdown,
}

#[derive(Clone, Default)]
struct RecordingPanel {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_initialize: bool,
    fail_loads: Arc<AtomicBool>,
}

impl RecordingPanel {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn loads(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Load(pixels) => Some(pixels),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| wanted(call)).count()
    }
}

impl Panel for RecordingPanel {
    fn initialize(&mut self, geometry: PanelGeometry, vcom: Vcom) -> Result<()> {
        self.record(Call::Initialize(geometry, vcom));
        if self.fail_initialize {
            return Err(Error::HardwareTimeout { waited_ms: 10_000 });
        }
        Ok(())
    }

    fn load_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if self.fail_loads.load(AtomicOrdering::SeqCst) {
            return Err(Error::HardwareTimeout { waited_ms: 10_000 });
        }
        self.record(Call::Load(frame.as_bytes().to_vec()));
        Ok(())
    }

    fn refresh_area(&mut self, area: Area, mode: RefreshMode) -> Result<()> {
        self.record(Call::Refresh(area, mode));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record(Call::Clear);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.record(Call::Shutdown);
    }
}

struct Fixture {
    dir: PathBuf,
    store: ArtifactStore,
    catalog: Arc<MemoryCatalog>,
    panel: RecordingPanel,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "mainichi-shashin-it-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self {
            store: ArtifactStore::new(&dir, GEOMETRY),
            dir,
            catalog: Arc::new(MemoryCatalog::new()),
            panel: RecordingPanel::default(),
        }
    }

    /// Register a photo whose artifact is a flat field of `level`.
    fn add_photo(&self, id: PhotoId, level: u8) -> Photo {
        let path = PathBuf::from(format!("{}.png", id));
        self.store
            .save(&path, &FrameBuffer::filled(GEOMETRY, level))
            .unwrap();
        let photo = Photo::new(id, format!("photo {}", id), path);
        self.catalog.insert(photo.clone());
        photo
    }

    fn slideshow(&self) -> Slideshow<RecordingPanel, Arc<MemoryCatalog>> {
        Slideshow::new(
            self.panel.clone(),
            Arc::clone(&self.catalog),
            self.store.clone(),
            Vcom::from_millivolts(1480),
            SlideshowTiming::default(),
        )
        .with_rng(StdRng::seed_from_u64(2025))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn one_photo_is_loaded_refreshed_and_counted() {
    let fixture = Fixture::new("one-photo");
    fixture.add_photo(1, 0x88);
    let mut show = fixture.slideshow();

    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::Displayed { id: 1 });

    let loads = fixture.panel.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].len(), GEOMETRY.pixel_count());
    assert!(loads[0].iter().all(|&b| b == 0x88));
    assert_eq!(
        fixture.panel.calls().last(),
        Some(&Call::Refresh(GEOMETRY.full_area(), RefreshMode::Gc16))
    );
    assert_eq!(fixture.panel.count(|c| matches!(c, Call::Refresh(..))), 1);

    let photo = fixture.catalog.photo(1).unwrap();
    assert_eq!(photo.display_count, 1);
    assert!(photo.last_displayed.is_some());
}

#[test]
fn empty_library_clears_without_catalog_writes() {
    let fixture = Fixture::new("empty");
    let mut show = fixture.slideshow();

    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::EmptyLibrary);
    assert_eq!(fixture.panel.calls(), vec![Call::Clear]);
    assert_eq!(fixture.catalog.write_count(), 0);
}

#[test]
fn empty_library_is_cleared_again_after_a_photo_was_shown() {
    let fixture = Fixture::new("empty-again");
    let mut show = fixture.slideshow();

    show.run_cycle().unwrap();
    show.run_cycle().unwrap();
    assert_eq!(fixture.panel.count(|c| *c == Call::Clear), 1);

    fixture.add_photo(4, 0);
    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::Displayed { id: 4 });
    fixture.catalog.mark_inactive(4).unwrap();
    show.run_cycle().unwrap();
    assert_eq!(fixture.panel.count(|c| *c == Call::Clear), 2);
}

#[test]
fn missing_artifact_deactivates_photo_without_touching_panel() {
    let fixture = Fixture::new("missing");
    fixture
        .catalog
        .insert(Photo::new(9, "deleted", "9.png"));
    let mut show = fixture.slideshow();

    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::ArtifactMissing { id: 9 });
    assert!(fixture.panel.calls().is_empty());
    assert!(!fixture.catalog.photo(9).unwrap().active);
    assert!(show
        .next_wait(&Ok(CycleOutcome::ArtifactMissing { id: 9 }))
        .is_zero());
}

#[test]
fn relative_artifact_root_is_joined_once() {
    // Relative to the test's working directory, like a relative `slideshow.artifacts`.
    let root = PathBuf::from(format!("relative-artifacts-{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    let store = ArtifactStore::new(&root, GEOMETRY);
    store
        .save(Path::new("1.png"), &FrameBuffer::filled(GEOMETRY, 0x44))
        .unwrap();
    assert!(store.exists(Path::new("1.png")));

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(Photo::new(1, "relative", "1.png"));
    let panel = RecordingPanel::default();
    let mut show = Slideshow::new(
        panel.clone(),
        Arc::clone(&catalog),
        store,
        Vcom::from_millivolts(1480),
        SlideshowTiming::default(),
    );

    let outcome = show.run_cycle();
    fs::remove_dir_all(&root).unwrap();

    assert_eq!(outcome.unwrap(), CycleOutcome::Displayed { id: 1 });
    assert!(catalog.photo(1).unwrap().active);
    assert_eq!(panel.loads(), vec![vec![0x44; GEOMETRY.pixel_count()]]);
}

#[test]
fn sequential_order_visits_stalest_first() {
    let fixture = Fixture::new("fairness");
    fixture.catalog.set_setting(ENABLE_RANDOM_ORDER, "false");
    // Ids deliberately out of staleness order.
    let hours = [(1, 10), (2, 7), (3, 12), (4, 8), (5, 9)];
    for (id, hour) in hours {
        let mut photo = fixture.add_photo(id, 0);
        photo.last_displayed = Some(Utc.with_ymd_and_hms(2025, 10, 1, hour, 0, 0).unwrap());
        fixture.catalog.insert(photo);
    }
    let mut show = fixture.slideshow();

    let visited: Vec<PhotoId> = (0..hours.len())
        .map(|_| match show.run_cycle().unwrap() {
            CycleOutcome::Displayed { id } => id,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(visited, vec![2, 4, 5, 1, 3]);

    // Every photo was shown once, the first one is now the stalest again.
    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::Displayed { id: 2 });
}

#[test]
fn new_photos_jump_the_queue() {
    let fixture = Fixture::new("new-first");
    fixture.catalog.set_setting(ENABLE_RANDOM_ORDER, "off");
    let mut old = fixture.add_photo(1, 0);
    old.last_displayed = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    old.display_count = 3;
    fixture.catalog.insert(old);
    fixture.add_photo(2, 0);

    let mut show = fixture.slideshow();
    assert_eq!(show.run_cycle().unwrap(), CycleOutcome::Displayed { id: 2 });
}

#[test]
fn random_order_is_reproducible_with_a_seed() {
    let fixture = Fixture::new("random");
    for id in 1..=5 {
        fixture.add_photo(id, 0);
    }

    let run = || {
        let mut show = fixture.slideshow();
        (0..20)
            .map(|_| match show.run_cycle().unwrap() {
                CycleOutcome::Displayed { id } => id,
                other => panic!("unexpected {:?}", other),
            })
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, run());
    assert!(first.iter().all(|id| (1..=5).contains(id)));
}

#[test]
fn panel_failure_backs_off_and_recovers() {
    let fixture = Fixture::new("backoff");
    fixture.add_photo(1, 0xFF);
    let mut show = fixture.slideshow();
    fixture.panel.fail_loads.store(true, AtomicOrdering::SeqCst);

    for attempt in 1..=3 {
        let result = show.run_cycle();
        assert!(matches!(result, Err(Error::HardwareTimeout { .. })));
        assert_eq!(show.next_wait(&result), Duration::from_secs(30));
        assert_eq!(show.retry_state().consecutive_failures, attempt);
    }
    assert_eq!(fixture.catalog.photo(1).unwrap().display_count, 0);

    fixture.panel.fail_loads.store(false, AtomicOrdering::SeqCst);
    let result = show.run_cycle();
    assert_eq!(result.as_ref().unwrap(), &CycleOutcome::Displayed { id: 1 });
    show.next_wait(&result);
    assert_eq!(show.retry_state().consecutive_failures, 0);
    assert_eq!(fixture.catalog.photo(1).unwrap().display_count, 1);
}

#[test]
fn off_palette_artifact_is_a_contract_violation() {
    let fixture = Fixture::new("contract");
    let mut image = GrayImage::from_pixel(12, 8, Luma([255]));
    image.put_pixel(3, 2, Luma([128]));
    image.save(fixture.dir.join("bad.png")).unwrap();
    fixture.catalog.insert(Photo::new(1, "bad", "bad.png"));
    let mut show = fixture.slideshow();

    let result = show.run_cycle();
    match &result {
        Err(e) => assert!(e.is_contract_violation(), "{}", e),
        Ok(outcome) => panic!("unexpected {:?}", outcome),
    }
    assert!(fixture.panel.loads().is_empty());
    assert_eq!(show.next_wait(&result), Duration::from_secs(30));
    assert!(fixture.catalog.photo(1).unwrap().active);
}

#[test]
fn display_duration_is_read_every_cycle() {
    let fixture = Fixture::new("settings");
    fixture.add_photo(1, 0);
    let mut show = fixture.slideshow();

    let result = show.run_cycle();
    assert_eq!(show.next_wait(&result), Duration::from_secs(300));

    fixture.catalog.set_setting(DISPLAY_DURATION_SECONDS, "3600");
    let result = show.run_cycle();
    assert_eq!(show.next_wait(&result), Duration::from_secs(3600));

    fixture.catalog.set_setting(DISPLAY_DURATION_SECONDS, "1");
    let result = show.run_cycle();
    assert_eq!(show.next_wait(&result), Duration::from_secs(60));
}

#[test]
fn start_runs_until_stopped_then_shuts_down() {
    let fixture = Fixture::new("start-stop");
    fixture.add_photo(1, 0x11);

    let mut handle = fixture.slideshow().start().unwrap();
    assert!(wait_for(|| !fixture.panel.loads().is_empty()));
    assert!(handle.is_running());

    // The worker is now waiting out a 300 s display duration.
    let stopping = Instant::now();
    handle.stop();
    assert!(stopping.elapsed() < Duration::from_secs(5));
    assert!(!handle.is_running());

    let calls = fixture.panel.calls();
    assert_eq!(
        calls.first(),
        Some(&Call::Initialize(GEOMETRY, Vcom::from_millivolts(1480)))
    );
    assert_eq!(calls.last(), Some(&Call::Shutdown));
    assert_eq!(fixture.panel.loads().len(), 1);
}

#[test]
fn stop_signal_ends_wait() {
    let fixture = Fixture::new("signal");
    let handle = fixture.slideshow().start().unwrap();
    assert!(wait_for(|| fixture.panel.calls().contains(&Call::Clear)));

    handle.stop_signal().stop();
    handle.wait();
    assert_eq!(fixture.panel.calls().last(), Some(&Call::Shutdown));
}

#[test]
fn failed_start_releases_the_panel() {
    let mut fixture = Fixture::new("start-fails");
    fixture.panel.fail_initialize = true;
    fixture.add_photo(1, 0);

    let result = fixture.slideshow().start();
    assert!(matches!(result, Err(Error::HardwareTimeout { .. })));
    assert_eq!(
        fixture.panel.calls(),
        vec![
            Call::Initialize(GEOMETRY, Vcom::from_millivolts(1480)),
            Call::Shutdown
        ]
    );
}
