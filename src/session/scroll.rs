//! Scroll decisions for a view rendering the conversation. The view
//! reports measurements in pixels and applies the returned action.
//!
//! This is the interface for a graphical front end; the terminal
//! client appends output and never scrolls. A view calls
//! [`after_mutation`] on every `on_update` from
//! `ChatSession::send_message`, passing the top of the turn at
//! `ChatSession::last_user_index`, and feeds scroll events to a
//! [`ScrollTracker`] to show or hide its "scroll to bottom" button.

/// How far above the container's top edge the last user turn may sit
/// before we stop following the stream.
pub const AUTOSCROLL_TOLERANCE: f64 = 10.0;

/// Distance from the bottom that still counts as "at the bottom".
pub const BOTTOM_THRESHOLD: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    /// Top edge of the scroll container
    pub top: f64,
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAction {
    None,
    /// Smoothly scroll to the end of the conversation
    ScrollToBottom,
}

/// Follow the stream unless the user turn that started the current
/// reply has already scrolled past the top of the container.
pub fn should_autoscroll(last_user_top: f64, container_top: f64) -> bool {
    last_user_top > container_top + AUTOSCROLL_TOLERANCE
}

/// Called after every change to the conversation. Without a rendered
/// last user turn there is nothing to anchor on, so nothing moves.
pub fn after_mutation(viewport: &Viewport, last_user_top: Option<f64>) -> ScrollAction {
    match last_user_top {
        Some(top) if should_autoscroll(top, viewport.top) => ScrollAction::ScrollToBottom,
        _ => ScrollAction::None,
    }
}

pub fn show_scroll_button(viewport: &Viewport) -> bool {
    viewport.distance_from_bottom() >= BOTTOM_THRESHOLD
}

/// Tracks whether the "scroll to bottom" button is visible as the
/// user scrolls.
#[derive(Debug, Default)]
pub struct ScrollTracker {
    show_button: bool,
}

impl ScrollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_button(&self) -> bool {
        self.show_button
    }

    /// Returns true if visibility changed.
    pub fn on_scroll(&mut self, viewport: &Viewport) -> bool {
        let show = show_scroll_button(viewport);
        let changed = show != self.show_button;
        self.show_button = show;
        changed
    }
}
