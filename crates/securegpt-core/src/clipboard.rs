//! Copying code blocks and the transient banner that reports it

use arboard::Clipboard;
use std::time::{Duration, Instant};
use tracing::error;

use crate::error::CopyError;

/// How long a banner stays up
pub const BANNER_DURATION: Duration = Duration::from_secs(2);

pub const COPY_SUCCESS_MESSAGE: &str = "Code copied!";
pub const COPY_FAILURE_MESSAGE: &str = "Failed to copy code.";

/// Anything that accepts a text payload
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), CopyError>;
}

/// The system clipboard, opened on first use
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), CopyError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new()
                .map_err(|e| CopyError(format!("Failed to initialize clipboard: {}", e)))?,
        };
        self.inner
            .insert(clipboard)
            .set_text(text)
            .map_err(|e| CopyError(format!("Failed to set clipboard text: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    shown_at: Instant,
}

/// Holds at most one banner; showing a new one replaces the old
#[derive(Debug)]
pub struct BannerSlot {
    current: Option<Banner>,
    duration: Duration,
}

impl Default for BannerSlot {
    fn default() -> Self {
        Self::new(BANNER_DURATION)
    }
}

impl BannerSlot {
    pub fn new(duration: Duration) -> Self {
        Self {
            current: None,
            duration,
        }
    }

    pub fn show(&mut self, kind: BannerKind, message: impl Into<String>, now: Instant) {
        self.current = Some(Banner {
            kind,
            message: message.into(),
            shown_at: now,
        });
    }

    pub fn current(&self) -> Option<&Banner> {
        self.current.as_ref()
    }

    /// Drop the banner once its time is up. Returns true if one was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|b| now.saturating_duration_since(b.shown_at) >= self.duration);
        if expired {
            self.current = None;
        }
        expired
    }
}

/// Copy `code` and put the matching banner up. Returns the kind shown.
pub fn copy_code(
    clipboard: &mut dyn ClipboardSink,
    code: &str,
    banners: &mut BannerSlot,
    now: Instant,
) -> BannerKind {
    match clipboard.set_text(code) {
        Ok(()) => {
            banners.show(BannerKind::Success, COPY_SUCCESS_MESSAGE, now);
            BannerKind::Success
        }
        Err(e) => {
            error!(error = %e, "Failed to copy text");
            banners.show(BannerKind::Error, COPY_FAILURE_MESSAGE, now);
            BannerKind::Error
        }
    }
}
