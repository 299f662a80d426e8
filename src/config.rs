//! Scene configuration.
//!
//! [`SceneConfig::default`] is the reference deployment: a 1024x768 capture of
//! `http://httpforever.com/` refreshed every second, the laptop model scaled by
//! five, and the camera/light/orbit limits of the original scene. A few values
//! can be overridden from the environment, see [`SceneConfig::from_env`].

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use cgmath::Vector3;

use crate::capture::OverlapPolicy;

pub const URL_ENV: &str = "LIVE_SCREEN_URL";
pub const INTERVAL_ENV: &str = "LIVE_SCREEN_INTERVAL_MS";
pub const BROWSER_ENV: &str = "LIVE_SCREEN_BROWSER";
pub const FIXTURE_ENV: &str = "LIVE_SCREEN_FIXTURE";
pub const MODEL_ENV: &str = "LIVE_SCREEN_MODEL";
pub const LOAD_TIMEOUT_ENV: &str = "LIVE_SCREEN_LOAD_TIMEOUT_MS";
pub const OVERLAP_ENV: &str = "LIVE_SCREEN_OVERLAP";

/// How the off-screen page is rasterized.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureBackend {
    /// Keep the page open in a headless Chromium-compatible browser while
    /// mounted. `timeout` bounds opening the page and every screenshot.
    HeadlessBrowser { program: String, timeout: Duration },
    /// Read a local image standing in for the page.
    Fixture { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub interval: Duration,
    pub overlap: OverlapPolicy,
    pub backend: CaptureBackend,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    pub path: String,
    pub scale: f32,
    pub offset: Vector3<f32>,
    /// `None` waits for the loader forever.
    pub load_timeout: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScreenConfig {
    pub width: f32,
    pub height: f32,
    pub position: Vector3<f32>,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vector3<f32>,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightConfig {
    pub position: Vector3<f32>,
    pub intensity: f32,
    pub color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitConfig {
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub target: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub capture: CaptureConfig,
    pub model: ModelConfig,
    pub screen: ScreenConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub orbit: OrbitConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            url: "http://httpforever.com/".to_string(),
            width: 1024,
            height: 768,
            interval: Duration::from_millis(1000),
            overlap: OverlapPolicy::SkipWhileInFlight,
            backend: CaptureBackend::HeadlessBrowser {
                program: "chromium".to_string(),
                timeout: Duration::from_secs(10),
            },
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "model/laptop.glb".to_string(),
            scale: 5.0,
            offset: Vector3::new(0.4, 0.3, -0.5),
            load_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 0.8,
            height: 0.5,
            position: Vector3::new(0.4, 0.8, -0.3),
            rotation: Vector3::new(-0.2, 0.0, 0.0),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vector3::new(1.0, 1.0, 2.0),
            fov_degrees: 50.0,
            near: 0.1,
            far: 2000.0,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.9, 4.0, 0.4),
            intensity: 5.0,
            color: [0x80, 0x80, 0x80],
        }
    }
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            enable_zoom: true,
            min_distance: 2.0,
            max_distance: 10.0,
            target: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            model: ModelConfig::default(),
            screen: ScreenConfig::default(),
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            orbit: OrbitConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(URL_ENV) {
            config.capture.url = url;
        }
        if let Some(raw) = lookup(INTERVAL_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds, got {:?}", INTERVAL_ENV, raw))?;
            if millis == 0 {
                bail!("{} must be greater than zero", INTERVAL_ENV);
            }
            config.capture.interval = Duration::from_millis(millis);
        }
        if let Some(program) = lookup(BROWSER_ENV) {
            if let CaptureBackend::HeadlessBrowser { program: current, .. } = &mut config.capture.backend {
                *current = program;
            }
        }
        if let Some(path) = lookup(FIXTURE_ENV) {
            config.capture.backend = CaptureBackend::Fixture {
                path: PathBuf::from(path),
            };
        }
        if let Some(path) = lookup(MODEL_ENV) {
            config.model.path = path;
        }
        if let Some(raw) = lookup(LOAD_TIMEOUT_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds, got {:?}", LOAD_TIMEOUT_ENV, raw))?;
            config.model.load_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(raw) = lookup(OVERLAP_ENV) {
            config.capture.overlap = match raw.trim() {
                "skip" => OverlapPolicy::SkipWhileInFlight,
                "allow" => OverlapPolicy::Allow,
                other => bail!("{} must be `skip` or `allow`, got {:?}", OVERLAP_ENV, other),
            };
        }

        Ok(config)
    }
}
