use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use peck_core::controller::Controller;
use peck_core::platform::hotkey::HotkeySignals;
use peck_core::platform::Platform;
use peck_core::logger;
use peck_core::settings::Settings;

pub struct App {
    pub workflows: Vec<PathBuf>,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub controller: Controller,
    pub should_quit: bool,
    platform: Arc<dyn Platform>,
    settings_path: PathBuf,
}

impl App {
    pub fn new(
        workflows: Vec<PathBuf>,
        log_rx: mpsc::Receiver<String>,
        platform: Arc<dyn Platform>,
        settings_path: PathBuf,
    ) -> Self {
        // Restore the last selected workflow if it's still around.
        let settings = Settings::load(&settings_path);
        let selected = settings
            .last_workflow
            .and_then(|last| workflows.iter().position(|w| *w == last))
            .unwrap_or(0);

        Self {
            workflows,
            selected,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            controller: Controller::new(),
            should_quit: false,
            platform,
            settings_path,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.workflows.len() {
            self.selected += 1;
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Start the selected workflow, or stop the active run.
    pub fn start_stop(&mut self) {
        if self.controller.is_running() {
            self.controller.stop();
        } else {
            self.start();
        }
    }

    pub fn start(&mut self) {
        let Some(path) = self.workflows.get(self.selected).cloned() else {
            logger::warn("no workflow selected");
            return;
        };
        if self.controller.start(path.clone(), Arc::clone(&self.platform)) {
            Settings { last_workflow: Some(path) }.save(&self.settings_path);
        }
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Apply pending global-hotkey requests. Start goes through the same
    /// exclusivity guard as the keyboard binding.
    pub fn poll_hotkeys(&mut self, signals: &HotkeySignals) {
        if signals.take_start() && !self.controller.is_running() {
            self.start();
        }
        if signals.take_stop() {
            self.controller.stop();
        }
    }

    pub fn quit(&mut self) {
        if self.controller.is_running() {
            self.controller.stop();
        }
        self.should_quit = true;
    }
}
