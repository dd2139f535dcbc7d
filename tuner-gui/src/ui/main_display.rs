//! # Main Display Module
//!
//! Layout of the tuner window: one coloured label per string, stacked in
//! reference table order, and the Start/Stop button underneath.

use iced::widget::{Space, button, column, container, row, text};
use iced::{Alignment, Background, Color, Element, Length};
use tuner_core::Verdict;
use tuner_core::state::NoteStatus;

/// Window background.
const BACKGROUND: Color = Color {
    r: 0.68,
    g: 0.85,
    b: 0.90,
    a: 1.0,
};

/// Label colour for each verdict.
fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::Unknown => Color::BLACK,
        Verdict::Tuned => Color::from_rgb(0.0, 0.5, 0.0),
        Verdict::High => Color::from_rgb(0.8, 0.0, 0.0),
        Verdict::Low => Color::from_rgb(0.0, 0.0, 0.8),
    }
}

/// Creates the complete main application view.
pub fn create_main_view(
    data: &crate::AppDisplayData,
    toggle_message: crate::Message,
) -> Element<'static, crate::Message> {
    let strings = data
        .board
        .iter()
        .fold(column![].spacing(5).align_x(Alignment::Center), |col, status| {
            col.push(string_row(status))
        });

    let caption = if data.running { "Stop" } else { "Start" };
    let toggle = button(text(caption).size(16))
        .padding([6, 20])
        .on_press(toggle_message);

    let content = column![strings, Space::with_height(20), toggle]
        .align_x(Alignment::Center)
        .padding(20);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(Background::Color(BACKGROUND)),
            ..container::Style::default()
        })
        .into()
}

/// One string: `E2: Tuned (164.82 Hz)` plus the cent offset once known.
fn string_row(status: &NoteStatus) -> Element<'static, crate::Message> {
    let color = verdict_color(status.verdict);
    let label = text(status.label.clone()).size(16).color(color);

    match status.cents_deviation {
        Some(cents) if status.verdict != Verdict::Unknown => row![
            label,
            text(format!("{:+.1} cents", cents)).size(12).color(color)
        ]
        .spacing(10)
        .align_y(Alignment::Center)
        .into(),
        _ => label.into(),
    }
}
