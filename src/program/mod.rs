//! A minimal Elm-style event loop for single-line terminal widgets.
//!
//! A [`Model`] is initialized once, then receives [`Msg`]s (timer ticks, key
//! presses, resizes) and answers each with an optional [`Cmd`]. After every
//! batch of messages the model's view is redrawn in place.
//!
//! The loop runs on the caller's thread. Other threads talk to it through a
//! [`ProgramHandle`].

mod signal;
mod terminal;

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, trace};

use crate::context::Context;
use signal::SignalGuard;
use terminal::TerminalSession;

/// Upper bound on how long the loop sleeps before re-checking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timer message addressed to a component.
///
/// `id` identifies the component and `tag` the generation of its timer. Zero
/// in either field means "unaddressed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickMsg {
    pub id: u64,
    pub tag: u64,
}

/// Messages delivered to a [`Model`].
///
/// `Quit` and `Interrupt` are consumed by the loop itself and never reach
/// `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Tick(TickMsg),
    Key(KeyEvent),
    Resize(u16, u16),
    Quit,
    Interrupt,
}

/// Follow-up work requested by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// Deliver the message after the delay.
    After(Duration, Box<Msg>),
    /// Stop the loop normally.
    Quit,
    /// Stop the loop as if the user pressed Ctrl+C.
    Interrupt,
}

impl Cmd {
    pub fn after(delay: Duration, msg: Msg) -> Self {
        Cmd::After(delay, Box::new(msg))
    }
}

/// Returns true for a Ctrl+C key press.
pub fn is_interrupt_key(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// State driven by a [`Program`].
pub trait Model {
    /// Called once before the first render.
    fn init(&mut self) -> Option<Cmd>;

    /// Handle one message and return the follow-up command, if any.
    fn update(&mut self, msg: Msg) -> Option<Cmd>;

    /// Render the current state as a single line.
    fn view(&self) -> String;
}

/// Where the rendered line is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    #[default]
    Stderr,
}

/// Event-loop tuning flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOption {
    /// Leave SIGINT/SIGTERM dispositions untouched.
    WithoutSignalHandler,
    /// Do not put the terminal in raw mode or read key events.
    WithoutInput,
    /// Do not draw anything.
    WithoutRenderer,
    /// Draw on the alternate screen.
    WithAltScreen,
    /// Write to the given stream (stderr by default).
    WithOutput(OutputTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Options {
    pub catch_signals: bool,
    pub input: bool,
    pub render: bool,
    pub alt_screen: bool,
    pub output: OutputTarget,
}

impl Options {
    pub(crate) fn from_options(options: &[ProgramOption]) -> Self {
        let mut resolved = Self {
            catch_signals: true,
            input: true,
            render: true,
            alt_screen: false,
            output: OutputTarget::default(),
        };
        for option in options {
            match option {
                ProgramOption::WithoutSignalHandler => resolved.catch_signals = false,
                ProgramOption::WithoutInput => resolved.input = false,
                ProgramOption::WithoutRenderer => resolved.render = false,
                ProgramOption::WithAltScreen => resolved.alt_screen = true,
                ProgramOption::WithOutput(target) => resolved.output = *target,
            }
        }
        resolved
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program was killed")]
    Killed,

    #[error("program was interrupted")]
    Interrupted,

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(String),
}

/// Sends messages into a running program from any thread.
///
/// Sends after the program has exited are silently dropped.
#[derive(Debug, Clone)]
pub struct ProgramHandle {
    tx: Sender<Msg>,
}

impl ProgramHandle {
    pub fn send(&self, msg: Msg) {
        let _ = self.tx.send(msg);
    }

    pub fn quit(&self) {
        self.send(Msg::Quit);
    }

    pub fn interrupt(&self) {
        self.send(Msg::Interrupt);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    Interrupted,
    Killed,
}

/// Runs a [`Model`] until it quits, is interrupted or its context ends.
pub struct Program<M> {
    model: M,
    options: Options,
    ctx: Context,
    tx: Sender<Msg>,
    rx: Receiver<Msg>,
}

impl<M: Model> Program<M> {
    pub fn new(model: M, options: impl IntoIterator<Item = ProgramOption>) -> Self {
        let options: Vec<ProgramOption> = options.into_iter().collect();
        let (tx, rx) = mpsc::channel();
        Self {
            model,
            options: Options::from_options(&options),
            ctx: Context::new(),
            tx,
            rx,
        }
    }

    /// Stop the program with [`ProgramError::Killed`] once `ctx` is cancelled.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn handle(&self) -> ProgramHandle {
        ProgramHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run the loop to completion, returning the final model on a normal quit.
    pub fn run(mut self) -> Result<M, ProgramError> {
        if let Some(reason) = self.ctx.err() {
            debug!(%reason, "program:context done before start");
            return Err(ProgramError::Killed);
        }

        let signals = if self.options.catch_signals {
            Some(SignalGuard::install()?)
        } else {
            None
        };

        let mut session = TerminalSession::open(&self.options)?;
        debug!(options = ?self.options, "program:start");

        let exit = self.event_loop(&mut session, signals.as_ref());
        let closed = session.close();
        drop(signals);

        let exit = exit?;
        closed?;
        debug!(?exit, "program:exit");

        match exit {
            Exit::Quit => Ok(self.model),
            Exit::Interrupted => Err(ProgramError::Interrupted),
            Exit::Killed => Err(ProgramError::Killed),
        }
    }

    fn event_loop(
        &mut self,
        session: &mut TerminalSession,
        signals: Option<&SignalGuard>,
    ) -> Result<Exit, ProgramError> {
        let mut timers: Vec<(Instant, Msg)> = Vec::new();
        let mut queue: VecDeque<Msg> = VecDeque::new();

        if let Some(cmd) = self.model.init()
            && let Some(exit) = schedule(cmd, &mut timers)
        {
            return Ok(exit);
        }
        session.draw(&self.model.view())?;

        loop {
            if let Some(reason) = self.ctx.err() {
                debug!(%reason, "program:context done");
                return Ok(Exit::Killed);
            }
            if let Some(guard) = signals {
                if guard.terminated() {
                    debug!("program:terminated by signal");
                    return Ok(Exit::Killed);
                }
                if guard.interrupted() {
                    queue.push_back(Msg::Interrupt);
                }
            }

            while let Ok(msg) = self.rx.try_recv() {
                queue.push_back(msg);
            }

            let now = Instant::now();
            timers.sort_by_key(|(at, _)| *at);
            let due = timers.iter().take_while(|(at, _)| *at <= now).count();
            queue.extend(timers.drain(..due).map(|(_, msg)| msg));

            if session.reads_input() {
                while event::poll(Duration::ZERO)? {
                    if let Some(msg) = translate(event::read()?) {
                        queue.push_back(msg);
                    }
                }
            }

            while let Some(msg) = queue.pop_front() {
                trace!(?msg, "program:message");
                let cmd = match msg {
                    Msg::Quit => return Ok(Exit::Quit),
                    Msg::Interrupt => return Ok(Exit::Interrupted),
                    Msg::Resize(width, height) => {
                        session.set_width(width);
                        self.model.update(Msg::Resize(width, height))
                    }
                    other => self.model.update(other),
                };
                if let Some(cmd) = cmd
                    && let Some(exit) = schedule(cmd, &mut timers)
                {
                    return Ok(exit);
                }
            }

            session.draw(&self.model.view())?;

            let wait = timers
                .iter()
                .map(|(at, _)| at.saturating_duration_since(Instant::now()))
                .min()
                .unwrap_or(POLL_INTERVAL)
                .min(POLL_INTERVAL);

            if session.reads_input() {
                event::poll(wait)?;
            } else if let Ok(msg) = self.rx.recv_timeout(wait) {
                queue.push_back(msg);
            }
        }
    }
}

fn schedule(cmd: Cmd, timers: &mut Vec<(Instant, Msg)>) -> Option<Exit> {
    match cmd {
        Cmd::After(delay, msg) => {
            timers.push((Instant::now() + delay, *msg));
            None
        }
        Cmd::Quit => Some(Exit::Quit),
        Cmd::Interrupt => Some(Exit::Interrupted),
    }
}

fn translate(event: Event) -> Option<Msg> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => Some(Msg::Key(key)),
        Event::Resize(width, height) => Some(Msg::Resize(width, height)),
        _ => None,
    }
}
