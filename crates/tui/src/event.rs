use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};

use peck_core::platform::hotkey::HotkeySignals;

use crate::ui;
use crate::App;

pub fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    hotkeys: Arc<HotkeySignals>,
) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        // Requests raised by the global hotkey listener
        app.poll_hotkeys(&hotkeys);

        // Drain log messages
        app.drain_logs();

        // Render
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with 100ms timeout (keeps TUI responsive)
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => {
                            app.quit();
                        }
                        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
                            app.move_up();
                        }
                        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
                            app.move_down();
                        }
                        KeyCode::Char('s') | KeyCode::Char('S') => {
                            app.start_stop();
                        }
                        KeyCode::Char('x') | KeyCode::Char('X') => {
                            app.stop();
                        }
                        KeyCode::Char('l') | KeyCode::Char('L') => {
                            app.toggle_log();
                        }
                        _ => {}
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.scroll_log_up(3);
                    }
                    MouseEventKind::ScrollDown => {
                        app.scroll_log_down(3);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }
}
