//! Long-lived headless browser pages.
//!
//! [`ChromiumLauncher`] starts one headless Chromium per page, attaches to it
//! over the DevTools protocol and keeps the page loaded until the returned
//! [`LivePage`] is dropped. Each page gets its own temporary browser profile,
//! removed together with the page.

use std::{path::PathBuf, process::Stdio};

use chromiumoxide::{Browser, Page, cdp::browser_protocol::page::CaptureScreenshotFormat, page::ScreenshotParams};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    task::JoinHandle,
};

use crate::capture::{CaptureError, Viewport};

const DEVTOOLS_BANNER: &str = "DevTools listening on ";

/// A page that keeps loading and running between screenshots.
pub trait LivePage: Send {
    /// PNG screenshot of the page as it looks right now.
    fn screenshot(&mut self) -> BoxFuture<'static, Result<Vec<u8>, CaptureError>>;
}

/// Opens the page a [`crate::capture::HeadlessBrowserSource`] keeps while mounted.
pub trait PageLauncher: Send + Sync + 'static {
    fn open(&self, viewport: &Viewport) -> BoxFuture<'static, Result<Box<dyn LivePage>, CaptureError>>;
}

/// Launches a Chromium-compatible browser (`chromium`, `google-chrome`, ...).
#[derive(Clone, Debug)]
pub struct ChromiumLauncher {
    program: String,
    profile_root: PathBuf,
}

impl ChromiumLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            profile_root: std::env::temp_dir(),
        }
    }

    /// Directory the per-page browser profiles are created in.
    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    async fn launch(&self, viewport: &Viewport) -> Result<ChromiumPage, CaptureError> {
        let profile = tempfile::Builder::new()
            .prefix("live-screen-")
            .tempdir_in(&self.profile_root)?;
        let mut child = Command::new(&self.program)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg(format!("--window-size={},{}", viewport.width, viewport.height))
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::Browser("browser stderr is not piped".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();
        let endpoint = loop {
            let Some(line) = lines.next_line().await? else {
                let status = child.wait().await?;
                return Err(CaptureError::Browser(format!(
                    "`{}` exited with {} before opening DevTools",
                    self.program, status
                )));
            };
            if let Some(at) = line.find(DEVTOOLS_BANNER) {
                break line[at + DEVTOOLS_BANNER.len()..].trim().to_string();
            }
            log::trace!("browser: {}", line);
        };
        // The browser blocks once its stderr pipe is full
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                log::trace!("browser: {}", line);
            }
        });

        let (browser, mut handler) = Browser::connect(endpoint).await.map_err(browser_error)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("browser connection closed: {}", e);
                    break;
                }
            }
        });
        let session = BrowserSession {
            browser,
            events,
            child,
            _profile: profile,
        };
        let page = session
            .browser
            .new_page(viewport.url.as_str())
            .await
            .map_err(browser_error)?;
        log::info!("opened {} in {}", viewport.url, self.program);
        Ok(ChromiumPage { page, _session: session })
    }
}

impl PageLauncher for ChromiumLauncher {
    fn open(&self, viewport: &Viewport) -> BoxFuture<'static, Result<Box<dyn LivePage>, CaptureError>> {
        let launcher = self.clone();
        let viewport = viewport.clone();
        async move {
            let page: Box<dyn LivePage> = Box::new(launcher.launch(&viewport).await?);
            Ok(page)
        }
        .boxed()
    }
}

fn browser_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Browser(e.to_string())
}

/// The browser process, its DevTools connection and its profile.
///
/// Dropping it kills the process; the profile directory goes last.
struct BrowserSession {
    browser: Browser,
    events: JoinHandle<()>,
    child: Child,
    _profile: TempDir,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.events.abort();
        if let Err(e) = self.child.start_kill() {
            log::debug!("browser already gone: {}", e);
        }
    }
}

struct ChromiumPage {
    page: Page,
    _session: BrowserSession,
}

impl LivePage for ChromiumPage {
    fn screenshot(&mut self) -> BoxFuture<'static, Result<Vec<u8>, CaptureError>> {
        let page = self.page.clone();
        async move {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            page.screenshot(params).await.map_err(browser_error)
        }
        .boxed()
    }
}
