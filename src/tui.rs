use std::io::{self, Stderr, Write};
use std::time::Duration;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::state::BubbleHandle;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Drives the placeholder animation
const TICK_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// A request finished; fills the placeholder behind `handle`
    Reply {
        handle: BubbleHandle,
        outcome: Result<String, ChatError>,
    },
}

pub type EventSender = mpsc::UnboundedSender<AppEvent>;

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: EventSender,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    // Only key presses, not releases or repeats
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                    Ok(Event::Mouse(mouse)) => AppEvent::Mouse(mouse),
                    Ok(Event::Resize(w, h)) => AppEvent::Resize(w, h),
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "terminal event stream error");
                        continue;
                    }
                };

                if tx_events.send(app_event).is_err() {
                    break;
                }
            }
        });

        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Handle for background tasks that report back into the loop
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode; is this an interactive terminal?")?;
    enter_screen(&mut io::stderr(), disable_raw_mode)?;

    let backend = CrosstermBackend::new(io::stderr());
    match Terminal::new(backend) {
        Ok(terminal) => Ok(terminal),
        Err(e) => {
            let _ = restore();
            Err(e).context("Failed to set up the terminal")
        }
    }
}

/// Enter the alternate screen with mouse capture. Raw mode is already on;
/// if this fails, `leave_raw` undoes it so the shell is left usable.
fn enter_screen<W: Write>(out: &mut W, leave_raw: impl FnOnce() -> io::Result<()>) -> Result<()> {
    if let Err(e) = execute!(out, EnterAlternateScreen, EnableMouseCapture) {
        if let Err(raw_err) = leave_raw() {
            tracing::warn!(error = %raw_err, "failed to disable raw mode");
        }
        return Err(e).context("Failed to enter the alternate screen");
    }
    Ok(())
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct BrokenTerminal;

    impl Write for BrokenTerminal {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
        }
    }

    #[test]
    fn test_failed_screen_setup_leaves_raw_mode() {
        let left_raw = Cell::new(false);

        let err = enter_screen(&mut BrokenTerminal, || {
            left_raw.set(true);
            Ok(())
        })
        .unwrap_err();

        assert!(left_raw.get());
        assert!(err.to_string().contains("alternate screen"));
    }

    #[test]
    fn test_screen_setup_keeps_raw_mode_on_success() {
        let left_raw = Cell::new(false);
        let mut out = Vec::new();

        enter_screen(&mut out, || {
            left_raw.set(true);
            Ok(())
        })
        .unwrap();

        assert!(!left_raw.get());
        assert!(!out.is_empty());
    }
}
