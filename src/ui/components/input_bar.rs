use eframe::egui;

pub enum InputAction {
    Send(String),
    Dictate,
}

pub fn render(ui: &mut egui::Ui, input_text: &mut String) -> Option<InputAction> {
    let mut send = false;
    let mut dictate = false;
    ui.horizontal(|ui| {
        let response = ui.text_edit_singleline(input_text);
        if ui.button("Send").clicked() {
            send = true;
        }
        if ui.button("🎤").on_hover_text("Dictate").clicked() {
            dictate = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
        }
    });

    if dictate {
        return Some(InputAction::Dictate);
    }

    // Validation happens in the pipeline; only skip obviously empty input here.
    if send && !input_text.trim().is_empty() {
        let message = input_text.clone();
        input_text.clear();
        return Some(InputAction::Send(message));
    }

    None
}
