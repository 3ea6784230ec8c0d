use anyhow::Result;
use clap::Parser;
use console::Style;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitCode, Output};
use std::sync::mpsc;
use std::time::Duration;
use tracing::debug;

use twirl::config::{Config, parse_style};
use twirl::shell::ShellCommand;
use twirl::{Context, ProgramOption, Spinner, SpinnerType, logger};

/// Exit status when the spinner stops before the command finished
const EXIT_CANCELLED: u8 = 130;

/// How long to wait for a cancelled command to be killed before exiting
const KILL_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "twirl", about = "Show a spinner while a command runs", version)]
struct Cli {
    /// Text shown next to the spinner
    #[arg(short, long)]
    title: Option<String>,

    /// Glyph animation
    #[arg(long = "type", value_enum, value_name = "TYPE")]
    spinner_type: Option<SpinnerType>,

    /// Glyph style as a dotted string (e.g. cyan.bold)
    #[arg(long, value_name = "STYLE")]
    spinner_style: Option<String>,

    /// Title style as a dotted string
    #[arg(long, value_name = "STYLE")]
    title_style: Option<String>,

    /// Print a static line instead of animating (also set by ACCESSIBLE)
    #[arg(long)]
    accessible: bool,

    /// Print the command's stdout and stderr once it finishes
    #[arg(long)]
    show_output: bool,

    /// Stop spinning after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Leave SIGINT and SIGTERM to their default handlers
    #[arg(long)]
    no_signal_handler: bool,

    /// Draw on the alternate screen
    #[arg(long)]
    alt_screen: bool,

    /// Directory to run the command in
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Run a command line through `sh -c` instead of a trailing command
    #[arg(short = 'c', long = "shell", value_name = "COMMAND_LINE", conflicts_with = "command")]
    shell: Option<String>,

    /// Config file (defaults to ~/.config/twirl/config.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Command to run while spinning; without one, spin until Ctrl+C
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' is not a valid timeout", value))
}

/// Spinner settings after merging the config file with command-line flags.
#[derive(Debug, PartialEq)]
struct Settings {
    title: Option<String>,
    spinner_type: SpinnerType,
    spinner_style: Option<Style>,
    title_style: Option<Style>,
    accessible: bool,
    show_output: bool,
    options: Vec<ProgramOption>,
}

impl Settings {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        let mut options = Vec::new();
        if cli.no_signal_handler {
            options.push(ProgramOption::WithoutSignalHandler);
        }
        if cli.alt_screen {
            options.push(ProgramOption::WithAltScreen);
        }

        Self {
            title: cli.title.clone().or_else(|| config.title.clone()),
            spinner_type: cli
                .spinner_type
                .or(config.spinner_type)
                .unwrap_or_default(),
            spinner_style: cli
                .spinner_style
                .as_deref()
                .map(parse_style)
                .or_else(|| config.spinner_style()),
            title_style: cli
                .title_style
                .as_deref()
                .map(parse_style)
                .or_else(|| config.title_style()),
            accessible: cli.accessible || config.accessible(),
            show_output: cli.show_output || config.show_output.unwrap_or(false),
            options,
        }
    }

    fn spinner(self, ctx: Context) -> Spinner {
        let mut spinner = Spinner::new()
            .spinner_type(self.spinner_type)
            .accessible(self.accessible)
            .program_options(self.options)
            .context(ctx);
        if let Some(title) = self.title {
            spinner = spinner.title(title);
        }
        if let Some(style) = self.spinner_style {
            spinner = spinner.style(style);
        }
        if let Some(style) = self.title_style {
            spinner = spinner.title_style(style);
        }
        spinner
    }
}

/// The command the spinner waits on.
#[derive(Debug, Default)]
struct Job {
    argv: Vec<String>,
    shell: Option<String>,
    workdir: Option<PathBuf>,
}

impl Job {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            argv: cli.command.clone(),
            shell: cli.shell.clone(),
            workdir: cli.cwd.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.shell.is_none()
    }

    fn run(&self, ctx: &Context) -> Result<Output> {
        let argv: Vec<&str> = self.argv.iter().map(String::as_str).collect();
        let mut command = match (self.shell.as_deref(), argv.split_first()) {
            (Some(line), _) => ShellCommand::shell(line),
            (None, Some((program, args))) => ShellCommand::new(program).args(args),
            (None, None) => anyhow::bail!("No command given"),
        };
        if let Some(dir) = self.workdir.as_deref() {
            command = command.workdir(dir);
        }
        command.run(ctx)
    }
}

/// Print the command's output when asked and pick the exit status.
///
/// `output` is `None` when the spinner stopped before the command finished.
fn finish(
    output: Option<Output>,
    show_output: bool,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<u8> {
    let Some(output) = output else {
        debug!("twirl:stopped before command finished");
        return Ok(EXIT_CANCELLED);
    };
    if show_output {
        stdout.write_all(&output.stdout)?;
        stdout.flush()?;
        stderr.write_all(&output.stderr)?;
        stderr.flush()?;
    }
    Ok(0)
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logger::init()?;
    let config = Config::load(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, &config);
    let job = Job::from_cli(&cli);
    debug!(?settings, ?job, "twirl:start");

    let ctx = match cli.timeout {
        Some(timeout) => Context::new().with_timeout(timeout),
        None => Context::new(),
    };
    let show_output = settings.show_output;
    let spinner = settings.spinner(ctx);

    if job.is_empty() {
        spinner.run()?;
        return Ok(ExitCode::SUCCESS);
    }

    let (output_tx, output_rx) = mpsc::channel();
    spinner
        .action_with_err(move |ctx| {
            let result = job.run(ctx);
            let _ = output_tx.send(result.as_ref().ok().cloned());
            result.map(|_| ())
        })
        .run()?;

    let output = output_rx.recv_timeout(KILL_GRACE).ok().flatten();
    let code = finish(
        output,
        show_output,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )?;
    Ok(ExitCode::from(code))
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("twirl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn trailing_command_keeps_its_flags() {
        let cli = parse(&["-t", "Building", "cargo", "build", "--release"]);
        assert_eq!(cli.title.as_deref(), Some("Building"));
        assert_eq!(cli.command, vec!["cargo", "build", "--release"]);
    }

    #[test]
    fn double_dash_separates_command() {
        let cli = parse(&["--type", "mini-dot", "--", "ls", "-la"]);
        assert_eq!(cli.spinner_type, Some(SpinnerType::MiniDot));
        assert_eq!(cli.command, vec!["ls", "-la"]);
    }

    #[test]
    fn timeout_accepts_fractions() {
        let cli = parse(&["--timeout", "0.5"]);
        assert_eq!(cli.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn timeout_rejects_negative_and_garbage() {
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&["--title", "From flag", "--type", "line", "--spinner-style", "red"]);
        let config = Config {
            title: Some("From config".to_string()),
            spinner_type: Some(SpinnerType::Moon),
            spinner_style: Some("blue".to_string()),
            title_style: Some("bold".to_string()),
            show_output: Some(true),
            ..Default::default()
        };
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.title.as_deref(), Some("From flag"));
        assert_eq!(settings.spinner_type, SpinnerType::Line);
        assert_eq!(settings.spinner_style, Some(parse_style("red")));
        assert_eq!(settings.title_style, Some(parse_style("bold")));
        assert!(settings.show_output);
    }

    #[test]
    fn config_fills_missing_flags() {
        let cli = parse(&[]);
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(settings.title, None);
        assert_eq!(settings.spinner_type, SpinnerType::Dots);
        assert!(settings.options.is_empty());
    }

    #[test]
    fn program_flags_become_options() {
        let cli = parse(&["--no-signal-handler", "--alt-screen"]);
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(
            settings.options,
            vec![
                ProgramOption::WithoutSignalHandler,
                ProgramOption::WithAltScreen
            ]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        let job = Job::default();
        assert!(job.is_empty());
        assert!(job.run(&Context::new()).is_err());
    }

    #[test]
    fn shell_flag_conflicts_with_trailing_command() {
        let result = Cli::try_parse_from(["twirl", "-c", "make", "cargo", "build"]);
        assert!(result.is_err());
    }

    #[test]
    fn shell_flag_and_cwd_build_the_job() {
        let cli = parse(&["--cwd", "/tmp", "-c", "make -j4 && make install"]);
        let job = Job::from_cli(&cli);
        assert!(!job.is_empty());
        assert_eq!(job.shell.as_deref(), Some("make -j4 && make install"));
        assert_eq!(job.workdir.as_deref(), Some(Path::new("/tmp")));
    }

    #[cfg(unix)]
    #[test]
    fn job_runs_shell_line_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job {
            shell: Some("pwd; echo done >&2".to_string()),
            workdir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let output = job.run(&Context::new()).unwrap();
        let printed = String::from_utf8_lossy(&output.stdout);
        assert_eq!(
            Path::new(printed.trim()).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "done");
    }

    fn finished_output() -> Output {
        Output {
            status: std::process::ExitStatus::default(),
            stdout: b"built\n".to_vec(),
            stderr: b"2 warnings\n".to_vec(),
        }
    }

    #[test]
    fn finish_exits_cancelled_when_command_did_not_finish() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = finish(None, true, &mut out, &mut err).unwrap();
        assert_eq!(code, EXIT_CANCELLED);
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn finish_prints_output_when_asked() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = finish(Some(finished_output()), true, &mut out, &mut err).unwrap();
        assert_eq!(code, 0);
        assert_eq!(out, b"built\n");
        assert_eq!(err, b"2 warnings\n");
    }

    #[test]
    fn finish_stays_quiet_without_show_output() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = finish(Some(finished_output()), false, &mut out, &mut err).unwrap();
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert!(err.is_empty());
    }
}
