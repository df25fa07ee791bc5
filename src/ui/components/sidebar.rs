use eframe::egui;

use crate::pipeline::sanitizer::decode_entities;
use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub sign_in: Option<(String, String)>,
    pub sign_up: Option<(String, String)>,
    pub sign_out: bool,
    pub set_online: Option<bool>,
    pub target_language: Option<String>,
    pub reload_history: bool,
    pub add_word: Option<(String, Option<String>)>,
    pub remove_word: Option<String>,
    pub unstar: Option<String>,
}

pub fn render(ui: &mut egui::Ui, state: &mut AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.heading("Account");
    ui.separator();

    match state.signed_in_as.clone() {
        Some(email) => {
            ui.label(format!("Signed in as {email}"));
            ui.horizontal(|ui| {
                if ui.button("Sign out").clicked() {
                    actions.sign_out = true;
                }
                if ui.button("Reload history").clicked() {
                    actions.reload_history = true;
                }
            });
        }
        None => {
            ui.label(egui::RichText::new("Not signed in: messages are not saved").weak());
            ui.label("Email:");
            ui.text_edit_singleline(&mut state.email_input);
            ui.label("Password:");
            ui.add(egui::TextEdit::singleline(&mut state.password_input).password(true));
            ui.horizontal(|ui| {
                let credentials = (state.email_input.trim().to_string(), state.password_input.clone());
                if ui.button("Sign in").clicked() {
                    actions.sign_in = Some(credentials.clone());
                    state.password_input.clear();
                }
                if ui.button("Sign up").clicked() {
                    actions.sign_up = Some(credentials);
                    state.password_input.clear();
                }
            });
        }
    }

    ui.separator();
    ui.heading("Practice");
    ui.horizontal(|ui| {
        ui.label("Language:");
        let response = ui.add(egui::TextEdit::singleline(&mut state.language_input).desired_width(48.0));
        if response.lost_focus() && !state.language_input.trim().is_empty() {
            actions.target_language = Some(state.language_input.trim().to_string());
        }
    });
    ui.label(format!(
        "Streak: {} day(s) (best {})",
        state.streak_current, state.streak_longest
    ));
    if state.speaking {
        ui.label(egui::RichText::new("Speaking…").italics());
    }

    if state.signed_in_as.is_some() {
        render_word_list(ui, state, &mut actions);
        render_favorites(ui, state, &mut actions);
    }

    ui.separator();
    ui.heading("Connection");
    let mut online = state.online;
    if ui.checkbox(&mut online, "Online").changed() {
        actions.set_online = Some(online);
    }
    let (color, text) = if state.online {
        (egui::Color32::GREEN, "● connected")
    } else {
        (egui::Color32::GRAY, "○ offline")
    };
    ui.colored_label(color, text);
    ui.label(format!("Queued messages: {}", state.queue_length));

    ui.separator();
    ui.label("Notices:");
    egui::ScrollArea::vertical()
        .max_height(200.0)
        .show(ui, |ui| {
            for notice in state.notices.iter().rev() {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(notice.at.format("%H:%M:%S").to_string()).weak());
                    ui.label(&notice.text);
                });
            }
        });

    actions
}

fn render_word_list(ui: &mut egui::Ui, state: &mut AppState, actions: &mut SidebarActions) {
    ui.separator();
    ui.heading("Word list");
    ui.horizontal(|ui| {
        ui.add(egui::TextEdit::singleline(&mut state.word_input).hint_text("word").desired_width(80.0));
        ui.add(
            egui::TextEdit::singleline(&mut state.translation_input)
                .hint_text("meaning")
                .desired_width(80.0),
        );
        if ui.button("Add").clicked() && !state.word_input.trim().is_empty() {
            let translation = Some(state.translation_input.trim().to_string()).filter(|t| !t.is_empty());
            actions.add_word = Some((state.word_input.trim().to_string(), translation));
            state.word_input.clear();
            state.translation_input.clear();
        }
    });
    egui::ScrollArea::vertical()
        .id_salt("word_list")
        .max_height(120.0)
        .show(ui, |ui| {
            for entry in &state.vocabulary {
                ui.horizontal(|ui| {
                    if ui.small_button("✕").clicked() {
                        actions.remove_word = Some(entry.word.clone());
                    }
                    match &entry.translation {
                        Some(translation) => ui.label(format!("{}: {translation}", entry.word)),
                        None => ui.label(entry.word.as_str()),
                    };
                });
            }
        });
}

fn render_favorites(ui: &mut egui::Ui, state: &AppState, actions: &mut SidebarActions) {
    ui.separator();
    ui.heading(format!("Favorites ({})", state.favorites.len()));
    egui::ScrollArea::vertical()
        .id_salt("favorites")
        .max_height(120.0)
        .show(ui, |ui| {
            for favorite in state.favorites.iter().rev() {
                ui.horizontal_wrapped(|ui| {
                    if ui.small_button("★").on_hover_text("Remove").clicked() {
                        actions.unstar = Some(favorite.message_id.clone());
                    }
                    ui.label(decode_entities(&favorite.text));
                });
            }
        });
}
