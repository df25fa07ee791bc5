use eframe::egui;

use crate::common::{DeliveryStatus, Sender};
use crate::pipeline::sanitizer::decode_entities;
use crate::ui::state::AppState;

/// Returns the id of a message whose star was clicked.
pub fn render(ui: &mut egui::Ui, state: &AppState) -> Option<String> {
    let mut toggled = None;
    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for entry in &state.messages {
                let (who, color) = match entry.message.sender {
                    Sender::User => ("You", egui::Color32::LIGHT_BLUE),
                    Sender::Ai => ("Tutor", egui::Color32::LIGHT_GREEN),
                };
                ui.horizontal_wrapped(|ui| {
                    let star = if state.is_favorite(&entry.message.id) { "★" } else { "☆" };
                    if ui.small_button(star).on_hover_text("Favorite").clicked() {
                        toggled = Some(entry.message.id.clone());
                    }
                    ui.colored_label(color, format!("{who}:"));
                    // Text is stored escaped for markup; this widget is plain text.
                    ui.label(decode_entities(&entry.message.text));
                    let label = entry.status.label();
                    if !label.is_empty() {
                        let status_color = match entry.status {
                            DeliveryStatus::Failed => egui::Color32::RED,
                            DeliveryStatus::Queued => egui::Color32::YELLOW,
                            _ => egui::Color32::GRAY,
                        };
                        ui.label(egui::RichText::new(format!("({label})")).small().color(status_color));
                    }
                });
            }
        });
    toggled
}
