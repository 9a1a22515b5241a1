use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use peck_core::controller::{self, Controller, RunOutcome};
use peck_core::platform::{create_platform, hotkey};
use peck_core::{logger, Error};

// Exit codes for headless runs
const EXIT_OK: u8 = 0;
const EXIT_RUN_FAILED: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    logger::init(&cwd.join("logs"));

    if args.first().map(String::as_str) == Some("run") {
        return run_headless(args.get(1).map(PathBuf::from));
    }

    match run_tui(&cwd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

/// `peck run <workflow.yaml>`: execute one workflow to completion with
/// log lines mirrored to stdout. 0 = success, 1 = step/phase failure or
/// cancellation, 2 = configuration error.
fn run_headless(path: Option<PathBuf>) -> ExitCode {
    logger::set_echo_stdout(true);

    let Some(path) = path else {
        eprintln!("usage: peck run <workflow.yaml>");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let mut ctl = Controller::new();
    if !ctl.start(path, create_platform()) {
        return ExitCode::from(EXIT_RUN_FAILED);
    }

    match ctl.join() {
        Some(Ok(RunOutcome::Completed)) => ExitCode::from(EXIT_OK),
        Some(Ok(_)) => ExitCode::from(EXIT_RUN_FAILED),
        Some(Err(Error::Config(_))) => ExitCode::from(EXIT_CONFIG_ERROR),
        _ => ExitCode::from(EXIT_RUN_FAILED),
    }
}

fn run_tui(cwd: &PathBuf) -> Result<()> {
    let workflows_dir = cwd.join("workflows");
    let settings_path = cwd.join("settings.json");

    let platform = create_platform();
    let workflows = controller::find_workflows(&workflows_dir);

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    logger::set_tui_sender(log_tx);
    logger::info(&format!(
        "peck started, {} workflow(s) in {}",
        workflows.len(),
        workflows_dir.display()
    ));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = peck_tui::App::new(workflows, log_rx, platform, settings_path);

    // Start global hotkey listener (Alt+Shift+S / Alt+Shift+X)
    let hotkeys = Arc::new(hotkey::HotkeySignals::default());
    hotkey::start_hotkey_listener(Arc::clone(&hotkeys));

    // Run TUI event loop on main thread
    let result = peck_tui::event::run(&mut terminal, &mut app, hotkeys);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}
