use anyhow::{Result, anyhow};
use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{BrowserState, COORDINATE_MAX, ScrollDirection};

/// Pixels moved by one `Scroll` action.
pub const SCROLL_DELTA_PX: f64 = 300.0;

/// What the agent loop needs from a browser. Coordinates are in the 0-1000
/// space; implementations map them onto their viewport.
#[async_trait]
pub trait BrowserController: Send {
    async fn start(&mut self, url: &str) -> Result<BrowserState>;
    async fn state(&mut self) -> Result<BrowserState>;
    async fn click(&mut self, x: i32, y: i32) -> Result<()>;
    async fn scroll(&mut self, x: i32, y: i32, direction: ScrollDirection) -> Result<()>;
    async fn type_text(&mut self, content: &str) -> Result<()>;
    async fn press_key(&mut self, key: &str) -> Result<()>;
    async fn wait(&mut self, duration: Duration) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1280, 720),
            chrome_path: None,
        }
    }
}

/// Chrome driven over CDP. Launched by `start`, released by `close` or drop.
pub struct ChromeBrowser {
    config: BrowserConfig,
    session: Option<Session>,
}

struct Session {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.session
            .as_ref()
            .map(|s| s.tab.clone())
            .ok_or_else(|| anyhow!("Browser not started. Call start() first."))
    }
}

/// Run a blocking CDP call on a clone of the tab so it doesn't stall tokio.
async fn on_tab<T, F>(tab: Arc<Tab>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Tab) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&tab))
        .await
        .map_err(|e| anyhow!("Browser task panicked: {}", e))?
}

/// Map 0-1000 coordinates onto a viewport of `width` x `height` CSS pixels.
fn to_pixels(x: i32, y: i32, (width, height): (f64, f64)) -> Point {
    let max = f64::from(COORDINATE_MAX);
    Point {
        x: f64::from(x) * width / max,
        y: f64::from(y) * height / max,
    }
}

/// Size of the page's layout viewport, which is what the screenshot shows.
/// The window size passed at launch includes browser chrome when headful.
fn viewport(tab: &Tab) -> Result<(f64, f64)> {
    let result = tab.evaluate("[window.innerWidth, window.innerHeight]", false)?;
    let size = result
        .value
        .and_then(|v| serde_json::from_value::<(f64, f64)>(v).ok())
        .ok_or_else(|| anyhow!("Could not read the page viewport size"))?;
    Ok(size)
}

fn capture(tab: &Tab) -> Result<BrowserState> {
    let screenshot =
        tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
    Ok(BrowserState {
        screenshot,
        url: tab.get_url(),
    })
}

#[async_trait]
impl BrowserController for ChromeBrowser {
    async fn start(&mut self, url: &str) -> Result<BrowserState> {
        let config = self.config.clone();
        let url = url.to_string();

        info!(headless = config.headless, "Launching Chrome...");
        let (browser, tab) = tokio::task::spawn_blocking(move || -> Result<(Browser, Arc<Tab>)> {
            let options = LaunchOptions {
                headless: config.headless,
                path: find_chrome(config.chrome_path),
                window_size: Some(config.viewport),
                args: vec![
                    std::ffi::OsStr::new("--no-first-run"),
                    std::ffi::OsStr::new("--no-default-browser-check"),
                    std::ffi::OsStr::new("--disable-infobars"),
                ],
                idle_browser_timeout: Duration::from_secs(300),
                ..Default::default()
            };
            let browser = Browser::new(options)
                .map_err(|e| anyhow!("Browser launch failed: {}", e))?;
            let tab = browser.new_tab()?;
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok((browser, tab))
        })
        .await
        .map_err(|e| anyhow!("Browser launch panicked: {}", e))??;

        info!("Chrome ready.");
        self.session = Some(Session { browser, tab });
        self.state().await
    }

    async fn state(&mut self) -> Result<BrowserState> {
        on_tab(self.tab()?, capture).await
    }

    async fn click(&mut self, x: i32, y: i32) -> Result<()> {
        on_tab(self.tab()?, move |tab| {
            let point = to_pixels(x, y, viewport(tab)?);
            debug!(px = point.x, py = point.y, "click");
            tab.click_point(point)?;
            Ok(())
        })
        .await
    }

    async fn scroll(&mut self, x: i32, y: i32, direction: ScrollDirection) -> Result<()> {
        let delta = match direction {
            ScrollDirection::Up => -SCROLL_DELTA_PX,
            ScrollDirection::Down => SCROLL_DELTA_PX,
        };
        on_tab(self.tab()?, move |tab| {
            let point = to_pixels(x, y, viewport(tab)?);
            debug!(px = point.x, py = point.y, delta, "scroll");
            tab.move_mouse_to_point(point)?;
            tab.call_method(wheel_event(point, delta))?;
            Ok(())
        })
        .await
    }

    async fn type_text(&mut self, content: &str) -> Result<()> {
        let content = content.to_string();
        on_tab(self.tab()?, move |tab| {
            tab.type_str(&content)?;
            Ok(())
        })
        .await
    }

    async fn press_key(&mut self, key: &str) -> Result<()> {
        let key = key.to_string();
        on_tab(self.tab()?, move |tab| {
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    async fn wait(&mut self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(Session { browser, tab }) = self.session.take() else {
            return Ok(());
        };
        info!("Closing Chrome.");
        tokio::task::spawn_blocking(move || {
            if let Err(e) = tab.close(true) {
                warn!("Failed to close tab: {}", e);
            }
            // Dropping the handle kills the process.
            drop(browser);
        })
        .await
        .map_err(|e| anyhow!("Browser close panicked: {}", e))
    }
}

fn wheel_event(point: Point, delta_y: f64) -> Input::DispatchMouseEvent {
    Input::DispatchMouseEvent {
        Type: Input::DispatchMouseEventTypeOption::MouseWheel,
        x: point.x,
        y: point.y,
        modifiers: None,
        timestamp: None,
        button: None,
        buttons: None,
        click_count: None,
        force: None,
        tangential_pressure: None,
        tilt_x: None,
        tilt_y: None,
        twist: None,
        delta_x: Some(0.0),
        delta_y: Some(delta_y),
        pointer_Type: None,
    }
}

/// Resolve the Chrome executable. `None` lets headless_chrome search itself.
fn find_chrome(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path);
        }
        warn!("Chrome path {:?} does not exist, searching instead", path);
    }

    let mut candidates: Vec<PathBuf> = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(local) = dirs::data_local_dir() {
        candidates.push(
            local
                .join("Google")
                .join("Chrome")
                .join("Application")
                .join("chrome.exe"),
        );
    }

    candidates.into_iter().find(|p| p.exists())
}
