//! The spinner widget.
//!
//! [`Spinner`] is configured with chained setters and consumed by
//! [`Spinner::run`], which animates it on the terminal until its action
//! finishes, its context is cancelled or the user interrupts it.
//!
//! ```no_run
//! use std::time::Duration;
//! use twirl::{Spinner, SpinnerType};
//!
//! Spinner::new()
//!     .title("Fetching index...")
//!     .spinner_type(SpinnerType::MiniDot)
//!     .action(|| std::thread::sleep(Duration::from_secs(2)))
//!     .run()
//!     .unwrap();
//! ```

pub mod animation;
pub mod kind;

use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use console::Style;
use tracing::debug;

use crate::context::Context;
use crate::program::{
    Cmd, Model, Msg, Options, OutputTarget, Program, ProgramError, ProgramHandle, ProgramOption,
    is_interrupt_key,
};
use animation::Animation;
pub use kind::SpinnerType;

const DEFAULT_TITLE: &str = "Loading...";

/// How often accessible mode re-checks the context while waiting.
const ACCESSIBLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("spinner action failed: {0:#}")]
    Action(anyhow::Error),

    #[error("spinner I/O failed: {0}")]
    Io(#[from] io::Error),
}

type PlainAction = Box<dyn FnOnce() + Send + 'static>;
type FallibleAction = Box<dyn FnOnce(&Context) -> anyhow::Result<()> + Send + 'static>;

enum Action {
    Plain(PlainAction),
    Fallible(FallibleAction),
}

impl Action {
    fn call(self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Action::Plain(action) => {
                action();
                Ok(())
            }
            Action::Fallible(action) => action(ctx),
        }
    }
}

/// Asks the program to quit when dropped, so a panicking action still ends the loop.
struct QuitOnDrop(ProgramHandle);

impl Drop for QuitOnDrop {
    fn drop(&mut self) {
        self.0.quit();
    }
}

/// A titled terminal spinner.
pub struct Spinner {
    title: String,
    title_style: Style,
    animation: Animation,
    ctx: Context,
    action: Option<Action>,
    program_options: Vec<ProgramOption>,
    accessible: bool,
}

impl Spinner {
    pub fn new() -> Self {
        let mut animation = Animation::new(SpinnerType::default());
        animation.set_style(Style::new().color256(212));
        Self {
            title: DEFAULT_TITLE.to_string(),
            title_style: Style::new(),
            animation,
            ctx: Context::new(),
            action: None,
            program_options: Vec::new(),
            accessible: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn title_style(mut self, style: Style) -> Self {
        self.title_style = style;
        self
    }

    /// Style applied to the glyph frames.
    pub fn style(mut self, style: Style) -> Self {
        self.animation.set_style(style);
        self
    }

    pub fn spinner_type(mut self, kind: SpinnerType) -> Self {
        self.animation.set_kind(kind);
        self
    }

    /// Cancellation source; cancelling it stops [`Spinner::run`] without error.
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Run `action` on its own thread while the spinner animates.
    ///
    /// The spinner stops once the action returns. Replaces any action set
    /// earlier.
    pub fn action(mut self, action: impl FnOnce() + Send + 'static) -> Self {
        self.action = Some(Action::Plain(Box::new(action)));
        self
    }

    /// Like [`Spinner::action`], but the action can fail and observes
    /// cancellation.
    ///
    /// The context passed in is cancelled when the spinner stops before the
    /// action returns. An error from the action is returned by [`Spinner::run`].
    pub fn action_with_err(
        mut self,
        action: impl FnOnce(&Context) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.action = Some(Action::Fallible(Box::new(action)));
        self
    }

    /// Print a static line instead of animating, for screen readers.
    pub fn accessible(mut self, accessible: bool) -> Self {
        self.accessible = accessible;
        self
    }

    /// Append event-loop options.
    pub fn program_options(mut self, options: impl IntoIterator<Item = ProgramOption>) -> Self {
        self.program_options.extend(options);
        self
    }

    /// Run the spinner, blocking until it stops.
    ///
    /// Cancellation and interrupts are not errors. Event-loop failures are
    /// returned as [`Error::Program`] and action failures as [`Error::Action`].
    pub fn run(mut self) -> Result<(), Error> {
        if let Some(reason) = self.ctx.err() {
            debug!(%reason, "spinner:context done before run");
            return Ok(());
        }

        let action = self.action.take();
        let options = std::mem::take(&mut self.program_options);
        self.target_output(Options::from_options(&options).output);
        if self.accessible {
            return self.run_accessible(action, &options);
        }

        let ctx = self.ctx.clone();
        let action_ctx = ctx.child();
        let program = Program::new(self, options).with_context(ctx);

        let (done_tx, done_rx) = mpsc::channel();
        let has_action = action.is_some();
        if let Some(action) = action {
            let quit = QuitOnDrop(program.handle());
            let worker_ctx = action_ctx.clone();
            thread::Builder::new()
                .name("spinner-action".to_string())
                .spawn(move || {
                    // Declared first so it drops last: the completion channel is
                    // settled before the loop is told to quit.
                    let _quit = quit;
                    let done_tx = done_tx;
                    let _ = done_tx.send(action.call(&worker_ctx));
                })?;
        }

        let outcome = program.run();
        let finished = done_rx.try_recv();
        if has_action && matches!(finished, Err(TryRecvError::Empty)) {
            debug!("spinner:stopped before action finished");
            action_ctx.cancel();
        }

        match outcome {
            Ok(_) => {}
            Err(ProgramError::Killed) => debug!("spinner:cancelled"),
            Err(ProgramError::Interrupted) => debug!("spinner:interrupted"),
            Err(e) => return Err(e.into()),
        }

        match finished {
            Ok(result) => result.map_err(Error::Action),
            Err(TryRecvError::Disconnected) if has_action => {
                Err(Error::Action(anyhow!("spinner action panicked")))
            }
            Err(_) => Ok(()),
        }
    }

    /// Detect colour support on the stream the spinner is written to.
    fn target_output(&mut self, output: OutputTarget) {
        let retarget = |style: Style| match output {
            OutputTarget::Stdout => style.for_stdout(),
            OutputTarget::Stderr => style.for_stderr(),
        };
        self.title_style = retarget(self.title_style.clone());
        let style = retarget(self.animation.style().clone());
        self.animation.set_style(style);
    }

    /// The static line printed in accessible mode: the title without a
    /// trailing `...`, followed by a `...` in the spinner style.
    fn accessible_line(&self) -> String {
        let title = self.title.strip_suffix("...").unwrap_or(&self.title);
        format!(
            "{}{}",
            self.title_style.apply_to(title),
            self.animation.style().apply_to("...")
        )
    }

    fn run_accessible(
        self,
        action: Option<Action>,
        options: &[ProgramOption],
    ) -> Result<(), Error> {
        let options = Options::from_options(options);
        if options.render {
            let mut out: Box<dyn Write> = match options.output {
                OutputTarget::Stdout => Box::new(io::stdout()),
                OutputTarget::Stderr => Box::new(io::stderr()),
            };
            writeln!(out, "{}", self.accessible_line())?;
            out.flush()?;
        }

        let Some(action) = action else {
            return Ok(());
        };

        let action_ctx = self.ctx.child();
        let worker_ctx = action_ctx.clone();
        let (done_tx, done_rx) = mpsc::channel();
        thread::Builder::new()
            .name("spinner-action".to_string())
            .spawn(move || {
                let _ = done_tx.send(action.call(&worker_ctx));
            })?;

        loop {
            match done_rx.recv_timeout(ACCESSIBLE_POLL) {
                Ok(result) => return result.map_err(Error::Action),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(reason) = self.ctx.err() {
                        debug!(%reason, "spinner:accessible wait cancelled");
                        action_ctx.cancel();
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Action(anyhow!("spinner action panicked")));
                }
            }
        }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for Spinner {
    fn init(&mut self) -> Option<Cmd> {
        Some(self.animation.tick())
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        match msg {
            Msg::Key(key) if is_interrupt_key(&key) => Some(Cmd::Interrupt),
            Msg::Tick(tick) => self.animation.update(tick),
            _ => None,
        }
    }

    /// The styled glyph frame followed by the styled title.
    ///
    /// A single space separates the two when the frame has no trailing
    /// whitespace of its own, so `|` renders as `| Title` rather than
    /// `|Title`. Frames that already end in a space (the dot sets) and the
    /// empty first frame of [`SpinnerType::Ellipsis`] are joined as is.
    fn view(&self) -> String {
        let frame = self.animation.view();
        if self.title.is_empty() {
            return frame;
        }
        let title = self.title_style.apply_to(&self.title);
        // Frames such as `|` would otherwise run straight into the title.
        let glyph = self.animation.frame();
        if glyph.is_empty() || glyph.ends_with(' ') {
            format!("{}{}", frame, title)
        } else {
            format!("{} {}", frame, title)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::TickMsg;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    const HEADLESS: [ProgramOption; 3] = [
        ProgramOption::WithoutSignalHandler,
        ProgramOption::WithoutInput,
        ProgramOption::WithoutRenderer,
    ];

    #[test]
    fn new_spinner_has_defaults() {
        let s = Spinner::new();
        assert_eq!(s.title, "Loading...");
        assert_eq!(s.animation.kind(), SpinnerType::Dots);
        assert_eq!(s.animation.glyphs(), SpinnerType::Dots.glyphs());
        assert!(!s.accessible);
        assert!(s.action.is_none());
        assert!(s.program_options.is_empty());
        assert!(!s.ctx.is_cancelled());
    }

    #[test]
    fn spinner_type_dots() {
        let s = Spinner::new().spinner_type(SpinnerType::Dots);
        assert_eq!(s.animation.glyphs(), SpinnerType::Dots.glyphs());
    }

    #[test]
    fn spinner_type_selects_every_variant() {
        for kind in SpinnerType::ALL {
            let s = Spinner::new().spinner_type(kind);
            assert_eq!(s.animation.kind(), kind);
            assert_eq!(s.animation.glyphs(), kind.glyphs());
        }
    }

    #[test]
    fn later_setters_override_earlier_ones() {
        let s = Spinner::new()
            .title("first")
            .spinner_type(SpinnerType::Moon)
            .title("second")
            .spinner_type(SpinnerType::Line)
            .accessible(true)
            .accessible(false);
        assert_eq!(s.title, "second");
        assert_eq!(s.animation.kind(), SpinnerType::Line);
        assert!(!s.accessible);
    }

    #[test]
    fn program_options_append() {
        let s = Spinner::new()
            .program_options([ProgramOption::WithoutSignalHandler])
            .program_options([ProgramOption::WithAltScreen]);
        assert_eq!(
            s.program_options,
            vec![
                ProgramOption::WithoutSignalHandler,
                ProgramOption::WithAltScreen
            ]
        );
    }

    #[test]
    fn style_methods_set_styles() {
        let style = Style::new().red();
        let title_style = Style::new().blue().bold();
        let s = Spinner::new()
            .style(style.clone())
            .title_style(title_style.clone());
        assert_eq!(s.animation.style(), &style);
        assert_eq!(s.title_style, title_style);
    }

    #[test]
    fn view_contains_title() {
        let s = Spinner::new().title("Test");
        assert!(s.view().contains("Test"));
    }

    #[test]
    fn view_starts_with_glyph_frame() {
        let s = Spinner::new().spinner_type(SpinnerType::Line).title("Test");
        assert_eq!(console::strip_ansi_codes(&s.view()), "| Test");

        let s = Spinner::new().title("Test");
        assert_eq!(console::strip_ansi_codes(&s.view()), "⣾ Test");
    }

    #[test]
    fn view_joins_empty_frame_without_separator() {
        let s = Spinner::new()
            .spinner_type(SpinnerType::Ellipsis)
            .title("Test");
        assert_eq!(s.animation.frame(), "");
        assert_eq!(console::strip_ansi_codes(&s.view()), "Test");
    }

    #[test]
    fn view_without_title_is_just_the_frame() {
        let s = Spinner::new().title("");
        assert_eq!(s.view(), s.animation.view());
    }

    #[test]
    fn init_returns_a_tick() {
        let mut s = Spinner::new();
        let cmd = s.init();
        assert!(matches!(cmd, Some(Cmd::After(_, ref msg)) if matches!(**msg, Msg::Tick(_))));
    }

    #[test]
    fn update_on_tick_returns_next_tick() {
        let mut s = Spinner::new();
        assert!(s.init().is_some());
        let cmd = s.update(Msg::Tick(TickMsg::default()));
        assert!(matches!(cmd, Some(Cmd::After(..))));
    }

    #[test]
    fn update_on_ctrl_c_interrupts() {
        let mut s = Spinner::new();
        let cmd = s.update(Msg::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert_eq!(cmd, Some(Cmd::Interrupt));
    }

    #[test]
    fn update_ignores_other_keys() {
        let mut s = Spinner::new();
        let cmd = s.update(Msg::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert_eq!(cmd, None);
    }

    #[test]
    fn run_after_cancellation_returns_ok() {
        let ctx = Context::new();
        let s = Spinner::new().context(ctx.clone());
        ctx.cancel();
        assert!(s.run().is_ok());
    }

    #[test]
    fn accessible_line_trims_title_ellipsis() {
        let s = Spinner::new();
        assert_eq!(console::strip_ansi_codes(&s.accessible_line()), "Loading...");

        let s = Spinner::new().title("Saving");
        assert_eq!(console::strip_ansi_codes(&s.accessible_line()), "Saving...");

        let s = Spinner::new().title("Done......");
        assert_eq!(console::strip_ansi_codes(&s.accessible_line()), "Done......");
    }

    #[test]
    fn accessible_line_styles_title_and_dots_separately() {
        let title_style = Style::new().blue().force_styling(true);
        let dots_style = Style::new().red().force_styling(true);
        let s = Spinner::new()
            .title("Saving...")
            .title_style(title_style.clone())
            .style(dots_style.clone());
        assert_eq!(
            s.accessible_line(),
            format!("{}{}", title_style.apply_to("Saving"), dots_style.apply_to("..."))
        );
    }

    #[test]
    fn styles_follow_the_output_stream() {
        let mut s = Spinner::new().title_style(Style::new().bold().for_stderr());
        s.target_output(OutputTarget::Stdout);
        assert_eq!(s.title_style, Style::new().bold().for_stdout());
        assert_eq!(s.animation.style(), &Style::new().color256(212).for_stdout());

        s.target_output(OutputTarget::Stderr);
        assert_eq!(s.title_style, Style::new().bold().for_stderr());
        assert_eq!(s.animation.style(), &Style::new().color256(212).for_stderr());
    }

    #[test]
    fn accessible_run_returns_ok() {
        let s = Spinner::new().accessible(true);
        assert!(s.run().is_ok());
    }

    #[test]
    fn accessible_run_waits_for_action() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        Spinner::new()
            .accessible(true)
            .program_options(HEADLESS)
            .action(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, Ordering::SeqCst);
            })
            .run()
            .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn accessible_run_honours_cancellation() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let start = Instant::now();
        let result = Spinner::new()
            .accessible(true)
            .program_options(HEADLESS)
            .context(ctx)
            .action(|| thread::sleep(Duration::from_secs(10)))
            .run();
        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn accessible_run_surfaces_action_error() {
        let result = Spinner::new()
            .accessible(true)
            .program_options(HEADLESS)
            .action_with_err(|_| Err(anyhow!("disk full")))
            .run();
        assert!(matches!(result, Err(Error::Action(ref e)) if e.to_string() == "disk full"));
    }

    #[test]
    fn run_stops_when_action_completes() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        Spinner::new()
            .program_options(HEADLESS)
            .action(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, Ordering::SeqCst);
            })
            .run()
            .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn run_surfaces_action_error() {
        let result = Spinner::new()
            .program_options(HEADLESS)
            .action_with_err(|_| Err(anyhow!("boom")))
            .run();
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Action(_)));
        assert_eq!(err.to_string(), "spinner action failed: boom");
    }

    #[test]
    fn run_reports_panicking_action() {
        let result = Spinner::new()
            .program_options(HEADLESS)
            .action(|| panic!("action blew up"))
            .run();
        assert!(matches!(result, Err(Error::Action(_))));
    }

    #[test]
    fn cancelling_context_stops_run_and_action_context() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        let (seen_tx, seen_rx) = mpsc::channel();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let result = Spinner::new()
            .program_options(HEADLESS)
            .context(ctx)
            .action_with_err(move |action_ctx| {
                while !action_ctx.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                let _ = seen_tx.send(());
                Ok(())
            })
            .run();

        assert!(result.is_ok());
        assert!(seen_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn run_without_action_stops_on_timeout() {
        let ctx = Context::new().with_timeout(Duration::from_millis(30));
        let result = Spinner::new()
            .program_options(HEADLESS)
            .context(ctx)
            .run();
        assert!(result.is_ok());
    }
}
