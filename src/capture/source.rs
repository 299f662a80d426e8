use std::{path::PathBuf, sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use image::{RgbaImage, imageops::FilterType};
use tokio::sync::Mutex as AsyncMutex;

use crate::capture::{
    CaptureError, Viewport,
    browser::{ChromiumLauncher, LivePage, PageLauncher},
};

/// Produces the current visual content of an off-screen page.
///
/// `open` is called once when the capturer mounts and `capture` once per
/// cycle. The returned futures must not borrow the source so cycles can
/// outlive the call that started them. Whatever the source keeps open is
/// released when it is dropped.
pub trait CaptureSource: Send + Sync + 'static {
    fn viewport(&self) -> &Viewport;

    /// Prepares the page ahead of the first cycle.
    fn open(&self) -> BoxFuture<'static, Result<(), CaptureError>> {
        futures::future::ok(()).boxed()
    }

    fn capture(&self) -> BoxFuture<'static, Result<RgbaImage, CaptureError>>;
}

impl CaptureSource for Box<dyn CaptureSource> {
    fn viewport(&self) -> &Viewport {
        (**self).viewport()
    }

    fn open(&self) -> BoxFuture<'static, Result<(), CaptureError>> {
        (**self).open()
    }

    fn capture(&self) -> BoxFuture<'static, Result<RgbaImage, CaptureError>> {
        (**self).capture()
    }
}

/// Scales `image` to exactly the viewport size. Images that already match are returned as is.
pub fn fit_to_viewport(image: RgbaImage, viewport: &Viewport) -> RgbaImage {
    if image.dimensions() == (viewport.width, viewport.height) {
        return image;
    }
    image::imageops::resize(&image, viewport.width, viewport.height, FilterType::Triangle)
}

type PageCell = Arc<AsyncMutex<Option<Box<dyn LivePage>>>>;

/// Captures a URL kept open in a single headless browser page.
///
/// The page opens on mount and keeps loading and running the document between
/// cycles; a cycle only takes a screenshot of it. A page that fails or times
/// out is closed and reopened by the next cycle. The page is closed when the
/// source is dropped, that is once the capturer has unmounted and its last
/// in-flight cycle has finished.
pub struct HeadlessBrowserSource<L = ChromiumLauncher> {
    viewport: Viewport,
    launcher: Arc<L>,
    timeout: Duration,
    page: PageCell,
}

impl HeadlessBrowserSource {
    pub fn new(viewport: Viewport, program: impl Into<String>, timeout: Duration) -> Self {
        Self::with_launcher(viewport, ChromiumLauncher::new(program), timeout)
    }
}

impl<L: PageLauncher> HeadlessBrowserSource<L> {
    /// `timeout` bounds opening the page and each screenshot separately.
    pub fn with_launcher(viewport: Viewport, launcher: L, timeout: Duration) -> Self {
        Self {
            viewport,
            launcher: Arc::new(launcher),
            timeout,
            page: Arc::new(AsyncMutex::new(None)),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.page.lock().await.is_some()
    }
}

async fn open_page<L: PageLauncher>(
    launcher: &L,
    viewport: &Viewport,
    timeout: Duration,
) -> Result<Box<dyn LivePage>, CaptureError> {
    let page = tokio::time::timeout(timeout, launcher.open(viewport))
        .await
        .map_err(|_| CaptureError::TimedOut(timeout))??;
    log::debug!("capture page for {} is open", viewport.url);
    Ok(page)
}

impl<L: PageLauncher> CaptureSource for HeadlessBrowserSource<L> {
    fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn open(&self) -> BoxFuture<'static, Result<(), CaptureError>> {
        let launcher = self.launcher.clone();
        let viewport = self.viewport.clone();
        let timeout = self.timeout;
        let page = self.page.clone();
        async move {
            let mut page = page.lock().await;
            if page.is_none() {
                *page = Some(open_page(launcher.as_ref(), &viewport, timeout).await?);
            }
            Ok(())
        }
        .boxed()
    }

    fn capture(&self) -> BoxFuture<'static, Result<RgbaImage, CaptureError>> {
        let launcher = self.launcher.clone();
        let viewport = self.viewport.clone();
        let timeout = self.timeout;
        let page = self.page.clone();
        async move {
            let mut page = page.lock().await;
            if page.is_none() {
                *page = Some(open_page(launcher.as_ref(), &viewport, timeout).await?);
            }
            let Some(live) = page.as_mut() else {
                return Err(CaptureError::NotLoaded);
            };
            let shot = match tokio::time::timeout(timeout, live.screenshot()).await {
                Ok(shot) => shot,
                Err(_) => Err(CaptureError::TimedOut(timeout)),
            };
            let bytes = match shot {
                // Nothing painted yet
                Ok(bytes) if bytes.is_empty() => return Err(CaptureError::NotLoaded),
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("closing the capture page of {} after: {}", viewport.url, e);
                    *page = None;
                    return Err(e);
                }
            };
            drop(page);

            let image = image::load_from_memory(&bytes)?.to_rgba8();
            Ok(fit_to_viewport(image, &viewport))
        }
        .boxed()
    }
}

/// Uses a local image as the page, re-read every cycle.
///
/// Useful for offline runs and tests: editing the file changes the screen on
/// the next cycle, and a missing file behaves like a page that has not loaded.
#[derive(Debug)]
pub struct FixturePageSource {
    viewport: Viewport,
    path: PathBuf,
}

impl FixturePageSource {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        let path = path.into();
        let viewport = Viewport::new(format!("file://{}", path.display()), width, height);
        Self { viewport, path }
    }
}

impl CaptureSource for FixturePageSource {
    fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn capture(&self) -> BoxFuture<'static, Result<RgbaImage, CaptureError>> {
        let viewport = self.viewport.clone();
        let path = self.path.clone();
        async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CaptureError::NotLoaded),
                Err(e) => return Err(e.into()),
            };
            let image = image::load_from_memory(&bytes)?.to_rgba8();
            Ok(fit_to_viewport(image, &viewport))
        }
        .boxed()
    }
}
