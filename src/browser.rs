//! The browsing surface the managers drive: in-app routes, full-page
//! navigation, popups and tabs.
//!
//! Production front-ends implement [`Browser`] on top of their window object.
//! [`HeadlessBrowser`] records every request instead, which is what command
//! line tools and tests use.

use std::sync::{Mutex, PoisonError};

/// In-app routes the managers navigate to.
pub mod routes {
    /// Login form. Reached after signup and logout.
    pub const LOGIN: &str = "/auth/login";
    /// TikTok linking page. Reached after every successful login.
    pub const CONNECT: &str = "/auth/connect";
    /// Route the Google OAuth flow returns to.
    pub const GOOGLE_CALLBACK: &str = "/auth/google/callback";
}

/// Position and size of the current browser window, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Horizontal position of the window.
    pub screen_x: i32,
    /// Vertical position of the window.
    pub screen_y: i32,
    /// Outer width of the window.
    pub outer_width: u32,
    /// Outer height of the window.
    pub outer_height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            screen_x: 0,
            screen_y: 0,
            outer_width: 1280,
            outer_height: 800,
        }
    }
}

/// Window features of the OAuth popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    /// Popup width.
    pub width: u32,
    /// Popup height.
    pub height: u32,
    /// Left offset, never negative.
    pub left: i64,
    /// Top offset, never negative.
    pub top: i64,
}

impl PopupFeatures {
    /// Width of the TikTok OAuth popup.
    pub const WIDTH: u32 = 640;
    /// Height of the TikTok OAuth popup.
    pub const HEIGHT: u32 = 780;

    /// A fixed-size popup centred over `window`, clamped to the screen origin.
    #[must_use]
    pub fn centered(window: WindowGeometry) -> Self {
        let centre = |origin: i32, outer: u32, size: u32| {
            (i64::from(origin) + (i64::from(outer) - i64::from(size)) / 2).max(0)
        };

        Self {
            width: Self::WIDTH,
            height: Self::HEIGHT,
            left: centre(window.screen_x, window.outer_width, Self::WIDTH),
            top: centre(window.screen_y, window.outer_height, Self::HEIGHT),
        }
    }

    /// The `window.open` feature string.
    #[must_use]
    pub fn to_feature_string(&self) -> String {
        format!(
            "popup=yes,toolbar=no,menubar=no,location=yes,status=no,scrollbars=yes,resizable=yes,width={},height={},left={},top={}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// What happened when a popup was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOutcome {
    /// The popup is open.
    Opened,
    /// The popup blocker refused it.
    Blocked,
    /// A handle was returned but the window was already closed.
    Closed,
}

/// Navigation and window capabilities used by the managers.
pub trait Browser: Send + Sync {
    /// Origin of the running application, e.g. `http://localhost:3000`.
    fn origin(&self) -> String;
    /// Full URL of the current page.
    fn current_url(&self) -> String;
    /// Geometry used to centre popups.
    fn window_geometry(&self) -> WindowGeometry;
    /// Client-side route change inside the application.
    fn push_route(&self, route: &str);
    /// Full-page navigation to an external URL.
    fn navigate(&self, url: &str);
    /// Opens a named popup window.
    fn open_popup(&self, url: &str, name: &str, features: &PopupFeatures) -> PopupOutcome;
    /// Opens a new tab. Returns `false` when no browsing context could be created.
    fn open_tab(&self, url: &str) -> bool;
}

/// A request recorded by [`HeadlessBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// [`Browser::push_route`].
    Route(String),
    /// [`Browser::navigate`].
    Navigate(String),
    /// [`Browser::open_popup`], recorded whatever the outcome.
    Popup {
        /// Popup URL.
        url: String,
        /// Window name.
        name: String,
        /// Feature string.
        features: String,
    },
    /// [`Browser::open_tab`].
    Tab(String),
}

/// A [`Browser`] without a screen: records every request.
#[derive(Debug)]
pub struct HeadlessBrowser {
    origin: String,
    geometry: WindowGeometry,
    popup_outcome: PopupOutcome,
    tabs_allowed: bool,
    current_url: Mutex<String>,
    events: Mutex<Vec<BrowserEvent>>,
}

impl HeadlessBrowser {
    /// A headless browser sitting on the application root.
    #[must_use]
    pub fn new(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();

        Self {
            current_url: Mutex::new(format!("{origin}/")),
            origin,
            geometry: WindowGeometry::default(),
            popup_outcome: PopupOutcome::Opened,
            tabs_allowed: true,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Sets the page the browser is currently on.
    #[must_use]
    pub fn at(self, url: &str) -> Self {
        *self.current_url.lock().unwrap_or_else(PoisonError::into_inner) = url.to_string();
        self
    }

    /// Sets the window geometry.
    #[must_use]
    pub const fn with_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Makes every popup request end with `outcome`.
    #[must_use]
    pub const fn with_popup_outcome(mut self, outcome: PopupOutcome) -> Self {
        self.popup_outcome = outcome;
        self
    }

    /// Refuses every new tab.
    #[must_use]
    pub const fn blocking_tabs(mut self) -> Self {
        self.tabs_allowed = false;
        self
    }

    /// Every request recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<BrowserEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last in-app route pushed.
    #[must_use]
    pub fn last_route(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            BrowserEvent::Route(route) => Some(route),
            _ => None,
        })
    }

    fn record(&self, event: BrowserEvent) {
        tracing::debug!(?event, "browser request");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn move_to(&self, url: String) {
        *self.current_url.lock().unwrap_or_else(PoisonError::into_inner) = url;
    }
}

impl Browser for HeadlessBrowser {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn current_url(&self) -> String {
        self.current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn window_geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn push_route(&self, route: &str) {
        self.move_to(format!("{}{route}", self.origin));
        self.record(BrowserEvent::Route(route.to_string()));
    }

    fn navigate(&self, url: &str) {
        self.move_to(url.to_string());
        self.record(BrowserEvent::Navigate(url.to_string()));
    }

    fn open_popup(&self, url: &str, name: &str, features: &PopupFeatures) -> PopupOutcome {
        self.record(BrowserEvent::Popup {
            url: url.to_string(),
            name: name.to_string(),
            features: features.to_feature_string(),
        });
        self.popup_outcome
    }

    fn open_tab(&self, url: &str) -> bool {
        self.record(BrowserEvent::Tab(url.to_string()));
        self.tabs_allowed
    }
}
