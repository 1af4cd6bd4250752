//! Terminal utilities for raw mode and terminal size.
//!
//! Wraps crossterm's terminal operations and provides a RAII guard that
//! restores the terminal state on drop.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use crossterm::terminal;

use srep_core::messages::Dimensions;

/// RAII guard that restores the terminal to cooked mode on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Enter raw terminal mode.
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self { _private: () })
    }

    /// Enter raw mode only when stdin is an interactive terminal.
    pub fn enter_if_tty() -> Result<Option<Self>> {
        if io::stdin().is_terminal() {
            Self::enter().map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Current terminal size. crossterm reports (columns, rows).
pub fn dimensions() -> io::Result<Dimensions> {
    let (cols, rows) = terminal::size()?;
    Ok(Dimensions::new(rows, cols))
}

/// Size for the initial shell request; falls back to 24x80.
pub fn initial_dimensions() -> Dimensions {
    dimensions().unwrap_or(Dimensions::new(24, 80))
}
