use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    bridge::{SurfaceTextureSlot, TextureBridge},
    capture::{CaptureError, CaptureSource, Snapshot},
    config::CaptureConfig,
};

/// What happens when a tick fires while the previous capture is still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Skip the tick. Published textures then follow tick order.
    #[default]
    SkipWhileInFlight,
    /// Start another capture anyway. The last capture to complete wins,
    /// which is not necessarily the last one started.
    Allow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            interval: config.interval,
            overlap: config.overlap,
        }
    }
}

/// Counters of a mounted capturer.
#[derive(Debug, Default)]
pub struct CaptureStats {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureCounts {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl CaptureStats {
    pub fn counts(&self) -> CaptureCounts {
        CaptureCounts {
            started: self.started.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

type PendingCapture = BoxFuture<'static, Result<RgbaImage, CaptureError>>;

struct Gate {
    mounted: bool,
    in_flight: usize,
}

struct Shared {
    gate: Mutex<Gate>,
    stats: CaptureStats,
    cycles: AtomicU64,
}

impl Shared {
    /// Starts a capture cycle unless unmounted or blocked by an in-flight one.
    ///
    /// The source is invoked while the gate is held so no capture can start
    /// once [`CaptureHandle`] has released the gate on unmount.
    fn begin<S: CaptureSource>(
        self: &Arc<Self>,
        source: &S,
        overlap: OverlapPolicy,
    ) -> Option<(u64, InFlight, PendingCapture)> {
        let mut gate = self.gate.lock();
        if !gate.mounted {
            return None;
        }
        if overlap == OverlapPolicy::SkipWhileInFlight && gate.in_flight > 0 {
            self.stats.skipped.fetch_add(1, Ordering::AcqRel);
            log::debug!("previous capture still running, skipping tick");
            return None;
        }
        gate.in_flight += 1;
        let cycle = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        self.stats.started.fetch_add(1, Ordering::AcqRel);
        let capture = source.capture();
        Some((cycle, InFlight(self.clone()), capture))
    }
}

/// Marks one capture as running until dropped.
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut gate = self.0.gate.lock();
        gate.in_flight = gate.in_flight.saturating_sub(1);
    }
}

/// Captures a [`CaptureSource`] on a fixed interval and publishes the
/// uploaded textures into a [`SurfaceTextureSlot`].
///
/// Nothing runs until [`SnapshotCapturer::mount`] is called, which also opens
/// the source's page. The first capture happens one interval after mounting;
/// each following tick is scheduled one interval after the previous tick,
/// regardless of how long captures take.
pub struct SnapshotCapturer<S, B: TextureBridge> {
    source: Arc<S>,
    bridge: Arc<B>,
    slot: SurfaceTextureSlot<B::Texture>,
    settings: CaptureSettings,
}

impl<S, B> SnapshotCapturer<S, B>
where
    S: CaptureSource,
    B: TextureBridge,
{
    pub fn new(source: S, bridge: B, slot: SurfaceTextureSlot<B::Texture>, settings: CaptureSettings) -> Self {
        Self {
            source: Arc::new(source),
            bridge: Arc::new(bridge),
            slot,
            settings,
        }
    }

    /// Starts the capture interval on `runtime`.
    ///
    /// Capturing stops when the returned handle is unmounted or dropped.
    pub fn mount(self, runtime: &Handle) -> CaptureHandle {
        let shared = Arc::new(Shared {
            gate: Mutex::new(Gate {
                mounted: true,
                in_flight: 0,
            }),
            stats: CaptureStats::default(),
            cycles: AtomicU64::new(0),
        });

        let viewport = self.source.viewport();
        log::info!(
            "capturing {} at {}x{} every {:?}",
            viewport.url,
            viewport.width,
            viewport.height,
            self.settings.interval
        );

        let ticker = runtime.spawn(run_ticker(self, shared.clone(), runtime.clone()));
        CaptureHandle {
            shared,
            ticker: Some(ticker),
        }
    }
}

async fn run_ticker<S, B>(capturer: SnapshotCapturer<S, B>, shared: Arc<Shared>, runtime: Handle)
where
    S: CaptureSource,
    B: TextureBridge,
{
    let SnapshotCapturer {
        source,
        bridge,
        slot,
        settings,
    } = capturer;
    let period = settings.interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The page loads while the first interval runs; cycles wait for it to open
    let opening = source.open();
    runtime.spawn(async move {
        if let Err(e) = opening.await {
            log::warn!("capture page did not open, retrying on the next cycle: {}", e);
        }
    });

    loop {
        ticker.tick().await;
        let Some((cycle, in_flight, capture)) = shared.begin(source.as_ref(), settings.overlap) else {
            continue;
        };
        let bridge = bridge.clone();
        let slot = slot.clone();
        let shared = shared.clone();
        // In-flight captures are not cancelled on unmount, only future ticks are
        runtime.spawn(async move {
            let _in_flight = in_flight;
            let uploaded = match capture.await {
                Ok(image) => bridge.upload(&Snapshot { cycle, image }),
                Err(e) => Err(e.into()),
            };
            match uploaded {
                Ok(texture) => {
                    let generation = slot.publish(cycle, texture);
                    shared.stats.completed.fetch_add(1, Ordering::AcqRel);
                    log::debug!("capture cycle {} published as generation {}", cycle, generation);
                }
                Err(e) => {
                    shared.stats.failed.fetch_add(1, Ordering::AcqRel);
                    log::error!("capture cycle {} failed: {:#}", cycle, e);
                }
            }
        });
    }
}

/// Keeps a [`SnapshotCapturer`] mounted.
///
/// Unmounting (explicitly or by dropping the handle) is synchronous: once it
/// returns, no further capture is started.
pub struct CaptureHandle {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn is_mounted(&self) -> bool {
        self.shared.gate.lock().mounted
    }

    pub fn stats(&self) -> CaptureCounts {
        self.shared.stats.counts()
    }

    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.shared.gate.lock().mounted = false;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            log::info!("capture unmounted after {} cycles", self.shared.cycles.load(Ordering::Acquire));
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}
