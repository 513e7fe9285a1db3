//! Mock surface for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::session::SessionToken;
use crate::surface::{Control, Script, ScriptKind, Selector, Surface, SurfaceError};

/// How often waits re-check the page.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// Bytes written by [`MockSurface::screenshot`].
const SCREENSHOT_BYTES: &[u8] = b"mock screenshot";

/// Observable state of a mock surface.
///
/// Handlers registered with [`MockSurface::on_click`], [`MockSurface::on_script`]
/// and [`MockSurface::on_navigate`] receive it mutably, so a click can reveal a
/// control, move the location or open a child surface.
#[derive(Default)]
pub struct MockPage {
    pub location: String,
    /// Selectors currently present.
    pub controls: HashSet<String>,
    /// Cookie jar exported and applied as the session token.
    pub session: Vec<u8>,
    pub children: Vec<Arc<dyn Surface>>,
    /// Frames by selector; a frame resolves only while its selector is present.
    pub frames: HashMap<String, Arc<dyn Surface>>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub navigations: Vec<String>,
    pub scripts: Vec<ScriptKind>,
    pub screenshots: Vec<PathBuf>,
    pub closed: bool,
}

impl MockPage {
    /// The last text typed into `selector`.
    pub fn last_typed(&self, selector: &str) -> Option<&str> {
        self.typed
            .iter()
            .rev()
            .find(|(s, _)| s == selector)
            .map(|(_, text)| text.as_str())
    }
}

type ClickHandler = Box<dyn Fn(&mut MockPage) + Send + Sync>;
type ScriptHandler = Box<dyn Fn(&Script, &mut MockPage) -> serde_json::Value + Send + Sync>;
type NavigateHandler = Box<dyn Fn(&str, &mut MockPage) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    clicks: HashMap<String, ClickHandler>,
    scripts: HashMap<ScriptKind, ScriptHandler>,
    navigate: Option<NavigateHandler>,
}

#[derive(Default)]
struct Inner {
    page: MockPage,
    handlers: Handlers,
    next_error: Option<SurfaceError>,
}

/// Mock implementation of the Surface trait.
///
/// Provides controllable behavior for testing:
/// - Controls appear and disappear on demand; waits poll until they show up
/// - Clicks, typed text, navigations and scripts are recorded for assertions
/// - Handlers script how the page reacts to clicks, scripts and navigation
/// - The next operation can be made to fail
///
/// Without a handler, navigation moves the location to the target, and
/// scripts return a neutral value (`false`, `null`, or an empty layout).
///
/// # Example
///
/// ```rust,ignore
/// use curtaincall_core::testing::MockSurface;
///
/// let surface = MockSurface::new("parent");
/// surface.add_control("#reserve");
/// surface.on_click("#reserve", |page| page.controls.insert("#seat".to_string()));
///
/// // Drive it through the Surface trait...
///
/// assert_eq!(surface.clicks(), vec!["#reserve"]);
/// ```
pub struct MockSurface {
    id: String,
    inner: Mutex<Inner>,
}

impl MockSurface {
    /// Create a new mock surface at `about:blank`.
    pub fn new(id: impl Into<String>) -> Self {
        let inner = Inner {
            page: MockPage {
                location: "about:blank".to_string(),
                ..MockPage::default()
            },
            ..Inner::default()
        };
        Self {
            id: id.into(),
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against the page.
    pub fn with_page<T>(&self, f: impl FnOnce(&mut MockPage) -> T) -> T {
        f(&mut self.lock().page)
    }

    pub fn add_control(&self, selector: &str) {
        self.lock().page.controls.insert(selector.to_string());
    }

    pub fn remove_control(&self, selector: &str) {
        self.lock().page.controls.remove(selector);
    }

    pub fn has_control(&self, selector: &str) -> bool {
        self.lock().page.controls.contains(selector)
    }

    pub fn set_location(&self, location: &str) {
        self.lock().page.location = location.to_string();
    }

    pub fn location(&self) -> String {
        self.lock().page.location.clone()
    }

    /// Open `child` as a child surface (as a popup would).
    pub fn add_child(&self, child: Arc<dyn Surface>) {
        self.lock().page.children.push(child);
    }

    /// Embed `frame` under `selector`. The selector must also be present as a control.
    pub fn add_frame(&self, selector: &str, frame: Arc<dyn Surface>) {
        self.lock().page.frames.insert(selector.to_string(), frame);
    }

    /// React to clicks on `selector`.
    pub fn on_click(
        &self,
        selector: &str,
        handler: impl Fn(&mut MockPage) + Send + Sync + 'static,
    ) {
        self.lock()
            .handlers
            .clicks
            .insert(selector.to_string(), Box::new(handler));
    }

    /// Answer scripts of `kind`.
    pub fn on_script(
        &self,
        kind: ScriptKind,
        handler: impl Fn(&Script, &mut MockPage) -> serde_json::Value + Send + Sync + 'static,
    ) {
        self.lock().handlers.scripts.insert(kind, Box::new(handler));
    }

    /// Decide where navigation lands.
    pub fn on_navigate(&self, handler: impl Fn(&str, &mut MockPage) + Send + Sync + 'static) {
        self.lock().handlers.navigate = Some(Box::new(handler));
    }

    /// Configure the next operation to fail with the given error.
    pub fn set_next_error(&self, error: SurfaceError) {
        self.lock().next_error = Some(error);
    }

    /// Selectors clicked, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.lock().page.clicks.clone()
    }

    /// `(selector, text)` pairs typed, in order.
    pub fn typed(&self) -> Vec<(String, String)> {
        self.lock().page.typed.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().page.navigations.clone()
    }

    /// Kinds of scripts evaluated, in order.
    pub fn scripts(&self) -> Vec<ScriptKind> {
        self.lock().page.scripts.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().page.screenshots.clone()
    }

    pub fn session_bytes(&self) -> Vec<u8> {
        self.lock().page.session.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().page.closed
    }

    /// Fails if closed or an error was queued.
    fn check(&self, inner: &mut Inner) -> Result<(), SurfaceError> {
        if let Some(err) = inner.next_error.take() {
            return Err(err);
        }
        if inner.page.closed {
            return Err(SurfaceError::Closed);
        }
        Ok(())
    }

    fn present(&self, inner: &Inner, control: &Control) -> Result<(), SurfaceError> {
        if control.surface_id != self.id {
            return Err(SurfaceError::NotFound(format!(
                "{} belongs to surface {}",
                control.selector, control.surface_id
            )));
        }
        if !inner.page.controls.contains(control.selector.as_str()) {
            return Err(SurfaceError::NotFound(control.selector.to_string()));
        }
        Ok(())
    }
}

fn default_script_result(kind: ScriptKind, script: &Script, page: &MockPage) -> serde_json::Value {
    match kind {
        ScriptKind::ClearField => serde_json::Value::Bool(
            script
                .arg_str("selector")
                .is_some_and(|selector| page.controls.contains(selector)),
        ),
        ScriptKind::ChallengeImage => serde_json::Value::Null,
        ScriptKind::EnumeratePartitions => {
            serde_json::json!({ "center_x": 0.0, "partitions": [] })
        }
        ScriptKind::CountAvailableUnits => serde_json::json!(0),
        _ => serde_json::Value::Bool(false),
    }
}

#[async_trait]
impl Surface for MockSurface {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&self, location: &str) -> Result<(), SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        let Inner { page, handlers, .. } = &mut *guard;
        page.navigations.push(location.to_string());
        match &handlers.navigate {
            Some(handler) => handler(location, page),
            None => page.location = location.to_string(),
        }
        Ok(())
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        Ok(guard.page.location.clone())
    }

    async fn wait_for_control(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Control, SurfaceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut guard = self.lock();
                self.check(&mut guard)?;
                if guard.page.controls.contains(selector.as_str()) {
                    return Ok(Control::new(selector.clone(), self.id.clone()));
                }
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(SurfaceError::timeout(format!("control {}", selector), timeout));
            }
            tokio::time::sleep(WAIT_TICK.min(deadline - now)).await;
        }
    }

    async fn click(&self, control: &Control) -> Result<(), SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        self.present(&guard, control)?;
        let Inner { page, handlers, .. } = &mut *guard;
        page.clicks.push(control.selector.to_string());
        if let Some(handler) = handlers.clicks.get(control.selector.as_str()) {
            handler(page);
        }
        Ok(())
    }

    async fn type_text(&self, control: &Control, text: &str) -> Result<(), SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        self.present(&guard, control)?;
        guard
            .page
            .typed
            .push((control.selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> Result<serde_json::Value, SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        let Inner { page, handlers, .. } = &mut *guard;
        page.scripts.push(script.kind);
        let value = match handlers.scripts.get(&script.kind) {
            Some(handler) => handler(script, page),
            None => default_script_result(script.kind, script, page),
        };
        Ok(value)
    }

    async fn open_child_surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        Ok(guard.page.children.clone())
    }

    async fn frame(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Arc<dyn Surface>, SurfaceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut guard = self.lock();
                self.check(&mut guard)?;
                let page = &guard.page;
                if page.controls.contains(selector.as_str()) {
                    if let Some(frame) = page.frames.get(selector.as_str()) {
                        return Ok(Arc::clone(frame));
                    }
                }
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(SurfaceError::timeout(format!("frame {}", selector), timeout));
            }
            tokio::time::sleep(WAIT_TICK.min(deadline - now)).await;
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SurfaceError> {
        {
            let mut guard = self.lock();
            self.check(&mut guard)?;
            guard.page.screenshots.push(path.to_path_buf());
        }
        tokio::fs::write(path, SCREENSHOT_BYTES)
            .await
            .map_err(|e| SurfaceError::Other(e.to_string()))
    }

    async fn export_session(&self) -> Result<SessionToken, SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        Ok(SessionToken::new(guard.page.session.clone()))
    }

    async fn apply_session(&self, token: &SessionToken) -> Result<(), SurfaceError> {
        let mut guard = self.lock();
        self.check(&mut guard)?;
        guard.page.session = token.bytes().to_vec();
        Ok(())
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        self.lock().page.closed = true;
        Ok(())
    }
}
