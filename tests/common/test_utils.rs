#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, future::BoxFuture};
use image::{ImageFormat, RgbaImage};
use parking_lot::Mutex;
use live_screen::{
    bridge::TextureBridge,
    capture::{CaptureError, CaptureSource, LivePage, PageLauncher, Snapshot, Viewport},
    data_structures::{bounds::Aabb, instance::Instance, scene_graph::{NodeTransforms, SceneNode}},
    normalizer::AssetLoader,
};

/// One scripted capture: wait `delay`, then yield a 1x1 bitmap whose red
/// channel is `pixel`, or fail when `pixel` is `None`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Step {
    pub(crate) delay: Duration,
    pub(crate) pixel: Option<u8>,
}

impl Step {
    pub(crate) fn ok(pixel: u8) -> Self {
        Self {
            delay: Duration::ZERO,
            pixel: Some(pixel),
        }
    }

    pub(crate) fn fail() -> Self {
        Self {
            delay: Duration::ZERO,
            pixel: None,
        }
    }

    pub(crate) fn after(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

/// A capture source that plays back `steps`, repeating the last one.
pub(crate) struct ScriptedSource {
    viewport: Viewport,
    steps: Vec<Step>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            viewport: Viewport::new("http://fixture.test/", 1, 1),
            steps,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts `capture` invocations, shared with the source.
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl CaptureSource for ScriptedSource {
    fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn capture(&self) -> BoxFuture<'static, Result<RgbaImage, CaptureError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .get(call)
            .or(self.steps.last())
            .copied()
            .unwrap_or_else(Step::fail);
        async move {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            match step.pixel {
                Some(pixel) => Ok(RgbaImage::from_pixel(1, 1, image::Rgba([pixel, 0, 0, 255]))),
                None => Err(CaptureError::NotLoaded),
            }
        }
        .boxed()
    }
}

/// Stand-in for a GPU texture: remembers what it was made from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FakeTexture {
    pub(crate) pixel: u8,
    pub(crate) cycle: u64,
}

pub(crate) struct PixelBridge;

impl TextureBridge for PixelBridge {
    type Texture = FakeTexture;

    fn upload(&self, snapshot: &Snapshot) -> anyhow::Result<FakeTexture> {
        Ok(FakeTexture {
            pixel: snapshot.image.get_pixel(0, 0)[0],
            cycle: snapshot.cycle,
        })
    }
}

/// Encodes a `width` x `height` PNG whose red channel is `pixel`.
pub(crate) fn png(pixel: u8, width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, image::Rgba([pixel, 0, 0, 255]))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// What a [`FakePage`] answers to one screenshot.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Shot {
    Pixel(u8),
    Blank,
    Fail,
    Hang,
}

/// Opens, screenshots and closes counted across every page of a launcher.
#[derive(Clone, Debug, Default)]
pub(crate) struct PageCounters {
    opens: Arc<AtomicUsize>,
    shots: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl PageCounters {
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn shots(&self) -> usize {
        self.shots.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Opens in-memory pages that answer screenshots from a script. Once the
/// script runs out every screenshot is a 2x2 PNG whose red channel counts
/// the screenshots taken so far.
#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    pub(crate) counters: PageCounters,
    script: Arc<Mutex<VecDeque<Shot>>>,
    failing_opens: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub(crate) fn scripted(shots: impl IntoIterator<Item = Shot>) -> Self {
        let launcher = Self::default();
        launcher.script.lock().extend(shots);
        launcher
    }

    /// The next `count` opens fail.
    pub(crate) fn failing_opens(self, count: usize) -> Self {
        self.failing_opens.store(count, Ordering::SeqCst);
        self
    }
}

impl PageLauncher for FakeLauncher {
    fn open(&self, _: &Viewport) -> BoxFuture<'static, Result<Box<dyn LivePage>, CaptureError>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let page = (!failing).then(|| FakePage {
            counters: self.counters.clone(),
            script: self.script.clone(),
        });
        async move {
            match page {
                Some(page) => {
                    let page: Box<dyn LivePage> = Box::new(page);
                    Ok(page)
                }
                None => Err(CaptureError::Browser("browser refused to start".to_string())),
            }
        }
        .boxed()
    }
}

pub(crate) struct FakePage {
    counters: PageCounters,
    script: Arc<Mutex<VecDeque<Shot>>>,
}

impl LivePage for FakePage {
    fn screenshot(&mut self) -> BoxFuture<'static, Result<Vec<u8>, CaptureError>> {
        let taken = self.counters.shots.fetch_add(1, Ordering::SeqCst) + 1;
        let shot = self.script.lock().pop_front().unwrap_or(Shot::Pixel(taken as u8));
        match shot {
            Shot::Pixel(pixel) => futures::future::ok(png(pixel, 2, 2)).boxed(),
            Shot::Blank => futures::future::ok(Vec::new()).boxed(),
            Shot::Fail => futures::future::err(CaptureError::Browser("page crashed".to_string())).boxed(),
            Shot::Hang => futures::future::pending().boxed(),
        }
    }
}

impl Drop for FakePage {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A scene node with fixed bounds and no GPU resources.
pub(crate) struct BoxNode {
    transforms: NodeTransforms,
    bounds: Option<Aabb>,
}

impl BoxNode {
    pub(crate) fn new(bounds: Option<Aabb>) -> Self {
        Self {
            transforms: NodeTransforms::new(1),
            bounds,
        }
    }

    pub(crate) fn with_transform(mut self, local: Instance) -> Self {
        self.set_local_transform(0, local);
        self
    }
}

impl SceneNode for BoxNode {
    fn transforms(&self) -> &NodeTransforms {
        &self.transforms
    }

    fn transforms_mut(&mut self) -> &mut NodeTransforms {
        &mut self.transforms
    }

    fn own_bounds(&self) -> Option<Aabb> {
        self.bounds
    }
}

/// Never answers.
pub(crate) struct StalledLoader;

impl AssetLoader for StalledLoader {
    fn load(&self, _: &str) -> BoxFuture<'static, anyhow::Result<Box<dyn SceneNode>>> {
        futures::future::pending().boxed()
    }
}

/// Answers after `delay` with a [`BoxNode`] of the given bounds.
pub(crate) struct BoxLoader {
    pub(crate) bounds: Aabb,
    pub(crate) original: Instance,
    pub(crate) delay: Duration,
}

impl AssetLoader for BoxLoader {
    fn load(&self, _: &str) -> BoxFuture<'static, anyhow::Result<Box<dyn SceneNode>>> {
        let node = BoxNode::new(Some(self.bounds)).with_transform(self.original.clone());
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            let node: Box<dyn SceneNode> = Box::new(node);
            Ok(node)
        }
        .boxed()
    }
}

/// Fails with `reason`.
pub(crate) struct FailingLoader(pub(crate) &'static str);

impl AssetLoader for FailingLoader {
    fn load(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Box<dyn SceneNode>>> {
        let message = format!("{}: {}", path, self.0);
        async move { Err(anyhow::anyhow!(message)) }.boxed()
    }
}

pub(crate) fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[macro_export]
macro_rules! assert_vec3_eq {
    ($actual:expr, $expected:expr) => {{
        let actual: cgmath::Vector3<f32> = $actual;
        let expected: cgmath::Vector3<f32> = $expected;
        assert!(
            $crate::common::test_utils::approx_eq(actual.x, expected.x)
                && $crate::common::test_utils::approx_eq(actual.y, expected.y)
                && $crate::common::test_utils::approx_eq(actual.z, expected.z),
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }};
}
