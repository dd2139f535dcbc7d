//! # Guitar Tuner GUI
//!
//! Window showing one line per guitar string (Unknown / Tuned / High / Low
//! with the measured frequency) and a Start/Stop button driving the tuning
//! loop.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application
//! - **Tuning Thread**: capture + analysis loop from `tuner-core`
//! - **Communication**: Crossbeam channels inside [`TunerHandle`]
//! - **Updates**: a 100 ms tick drains verdict updates into the board

mod ui;

use iced::{Element, Size, Subscription, Task, Theme};
use std::time::Duration;
use tuner_core::audio::CpalSource;
use tuner_core::{TunerConfig, TunerHandle, VerdictBoard, scheduler};
use ui::main_display::create_main_view;

/// Optional configuration file, read from the working directory.
const CONFIG_PATH: &str = "tuner_config.json";

/// How often the GUI polls for new verdicts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Main entry point for the Guitar Tuner application.
///
/// Loads and validates the configuration (a bad one is fatal here), starts
/// the idle tuning thread, then hands control to Iced.
pub fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("[MAIN] Starting Guitar Tuner...");
    let config = TunerConfig::load_or_default(CONFIG_PATH)?;
    let board = VerdictBoard::new(&config.references);

    let handle = scheduler::spawn(config, |config: &TunerConfig| {
        CpalSource::open(config.sample_rate)
    })?;
    log::info!("[MAIN] Real-time audio capture ready. Press Start to begin tuning.");

    iced::application("Guitar Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .window_size(Size::new(600.0, 400.0))
        .resizable(false)
        .run_with(move || (TunerApp::new(handle, board), Task::none()))
        .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))?;

    log::info!("[MAIN] Application finished");
    Ok(())
}

/// Application message types.
#[derive(Debug, Clone)]
pub enum Message {
    /// Start/Stop button pressed.
    ToggleTuning,
    /// Timer tick, drains pending verdict updates.
    Tick,
}

/// Data the view needs to render.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub running: bool,
    pub board: VerdictBoard,
}

#[derive(Debug)]
struct TunerApp {
    handle: TunerHandle,
    display_data: AppDisplayData,
    /// Keeps polling after Stop until the last cycle's verdict is drained.
    draining: bool,
}

impl TunerApp {
    fn new(handle: TunerHandle, board: VerdictBoard) -> Self {
        Self {
            handle,
            display_data: AppDisplayData {
                running: false,
                board,
            },
            draining: false,
        }
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::ToggleTuning => {
                self.drain_updates();
                let running = self.handle.toggle();
                log::info!(
                    "[MAIN] Tuning {}",
                    if running { "started" } else { "stopped" }
                );
                self.display_data.running = running;
                self.draining = !running;
            }
            Message::Tick => {
                // Read before draining so a verdict sent after the drain is
                // still picked up by the next tick.
                let busy = self.handle.is_busy();
                self.drain_updates();
                self.display_data.running = self.handle.is_running();
                self.draining = busy;
            }
        }
    }

    /// Applies every verdict the tuning thread produced since the last poll.
    fn drain_updates(&mut self) {
        for update in self.handle.drain_updates() {
            log::debug!("[MAIN] {}", update.label);
            self.display_data.board.apply(&update);
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, Message::ToggleTuning)
    }

    /// Polls for verdicts while tuning, and after Stop until the cycle that
    /// was already running has finished.
    fn subscription(&self) -> Subscription<Message> {
        if self.display_data.running || self.draining {
            iced::time::every(POLL_INTERVAL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}
