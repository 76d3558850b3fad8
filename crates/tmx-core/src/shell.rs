//! Messages from the UI layer to the native window shell.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A request sent over the shell bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMessage {
    Minimize,
    /// Maximize, or restore when already maximized.
    ToggleMaximize,
    Close,
    /// Ask for the application version.
    Version,
}

impl ShellMessage {
    pub const fn channel(self) -> &'static str {
        match self {
            Self::Minimize => "window:minimize",
            Self::ToggleMaximize => "window:maximize",
            Self::Close => "window:close",
            Self::Version => "app:version",
        }
    }

    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel {
            "window:minimize" => Some(Self::Minimize),
            "window:maximize" => Some(Self::ToggleMaximize),
            "window:close" => Some(Self::Close),
            "app:version" => Some(Self::Version),
            _ => None,
        }
    }
}

impl fmt::Display for ShellMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

impl FromStr for ShellMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_channel(s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown shell channel: {s}")))
    }
}

/// The native window the shell controls.
pub trait WindowControls {
    fn minimize(&mut self);
    fn maximize(&mut self);
    fn unmaximize(&mut self);
    fn is_maximized(&self) -> bool;
    fn close(&mut self);
    fn app_version(&self) -> String;
}

/// Perform `message` on `window`. Only the version query has a reply.
pub fn dispatch<W: WindowControls + ?Sized>(message: ShellMessage, window: &mut W) -> Option<String> {
    tracing::debug!("Shell message: {}", message);
    match message {
        ShellMessage::Minimize => window.minimize(),
        ShellMessage::ToggleMaximize => {
            if window.is_maximized() {
                window.unmaximize();
            } else {
                window.maximize();
            }
        }
        ShellMessage::Close => window.close(),
        ShellMessage::Version => return Some(window.app_version()),
    }
    None
}
