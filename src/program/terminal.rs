//! Terminal session management for the event loop.

use std::io::{self, IsTerminal, Write};

use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tracing::trace;

use super::{Options, OutputTarget};

/// Owns the terminal state for one program run.
///
/// Raw mode is only entered when input is enabled and stdin is a TTY, and
/// nothing is drawn unless the output stream is a TTY. Whatever was changed
/// is restored by [`TerminalSession::close`] or on drop.
pub(crate) struct TerminalSession {
    out: Box<dyn Write>,
    render: bool,
    raw: bool,
    alt_screen: bool,
    width: Option<u16>,
    last_line: Option<String>,
    closed: bool,
}

impl TerminalSession {
    pub(crate) fn open(options: &Options) -> io::Result<Self> {
        let (out, is_tty): (Box<dyn Write>, bool) = match options.output {
            OutputTarget::Stdout => (Box::new(io::stdout()), io::stdout().is_terminal()),
            OutputTarget::Stderr => (Box::new(io::stderr()), io::stderr().is_terminal()),
        };
        let render = options.render && is_tty;

        let mut session = Self {
            out,
            render,
            raw: false,
            alt_screen: render && options.alt_screen,
            width: None,
            last_line: None,
            closed: false,
        };

        if options.input && io::stdin().is_terminal() {
            terminal::enable_raw_mode()?;
            session.raw = true;
        }
        if session.render {
            if session.alt_screen {
                execute!(session.out, EnterAlternateScreen)?;
            }
            execute!(session.out, Hide)?;
            session.width = terminal::size().ok().map(|(width, _)| width);
        }

        trace!(
            render = session.render,
            raw = session.raw,
            alt_screen = session.alt_screen,
            "terminal:open"
        );
        Ok(session)
    }

    pub(crate) fn reads_input(&self) -> bool {
        self.raw
    }

    pub(crate) fn set_width(&mut self, width: u16) {
        self.width = Some(width);
        self.last_line = None;
    }

    /// Redraw the current line if the view changed.
    pub(crate) fn draw(&mut self, view: &str) -> io::Result<()> {
        if !self.render {
            return Ok(());
        }

        let line = fit_line(view, self.width);
        if self.last_line.as_deref() == Some(line.as_str()) {
            return Ok(());
        }

        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(&line)
        )?;
        self.out.flush()?;
        self.last_line = Some(line);
        Ok(())
    }

    /// Clear the spinner line and restore the terminal. Idempotent.
    pub(crate) fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let drawn = if self.render {
            self.erase()
        } else {
            Ok(())
        };
        let raw = if self.raw {
            terminal::disable_raw_mode()
        } else {
            Ok(())
        };
        trace!("terminal:close");
        drawn.and(raw)
    }

    fn erase(&mut self) -> io::Result<()> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine), Show)?;
        if self.alt_screen {
            queue!(self.out, LeaveAlternateScreen)?;
        }
        self.out.flush()
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Flatten `view` onto one line and truncate it to fit a terminal `width`
/// columns wide.
pub(crate) fn fit_line(view: &str, width: Option<u16>) -> String {
    let view = view.replace('\n', " ");
    match width {
        // Leave the last column free so the cursor never wraps.
        Some(width) => {
            console::truncate_str(&view, usize::from(width.saturating_sub(1)), "…").into_owned()
        }
        None => view,
    }
}
