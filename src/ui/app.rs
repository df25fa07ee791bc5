use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent};

use super::components::{
    chat_area,
    input_bar::{self, InputAction},
    sidebar::{self, SidebarActions},
};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
        target_language: &str,
    ) -> Self {
        Self {
            state: AppState::new(target_language),
            command_sender,
            event_receiver,
        }
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                ChatEvent::MessageDisplayed { message, status } => {
                    self.state.push_message(message, status)
                }
                ChatEvent::DeliveryUpdated { id, status } => self.state.update_status(&id, status),
                ChatEvent::HistoryCleared => self.state.clear_messages(),
                ChatEvent::SignedIn(email) => self.state.signed_in_as = Some(email),
                ChatEvent::SignedOut => self.state.signed_in_as = None,
                ChatEvent::ConnectivityChanged(online) => self.state.online = online,
                ChatEvent::QueueLength(length) => self.state.queue_length = length,
                ChatEvent::StreakUpdated { current, longest } => {
                    self.state.streak_current = current;
                    self.state.streak_longest = longest;
                }
                ChatEvent::Notice(text) => self.state.push_notice(text),
                ChatEvent::Speaking(speaking) => self.state.speaking = speaking,
                ChatEvent::FavoritesChanged(favorites) => self.state.favorites = favorites,
                ChatEvent::VocabularyChanged(entries) => self.state.vocabulary = entries,
            }
        }
    }

    fn send_command(&mut self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat loop: {err}");
        }
    }

    fn apply_sidebar_actions(&mut self, actions: SidebarActions) {
        if let Some((email, password)) = actions.sign_in {
            self.send_command(ChatCommand::SignIn { email, password });
        }
        if let Some((email, password)) = actions.sign_up {
            self.send_command(ChatCommand::SignUp { email, password });
        }
        if actions.sign_out {
            self.send_command(ChatCommand::SignOut);
        }
        if let Some(online) = actions.set_online {
            self.send_command(ChatCommand::SetOnline(online));
        }
        if let Some(language) = actions.target_language {
            self.send_command(ChatCommand::SetTargetLanguage(language));
        }
        if actions.reload_history {
            self.send_command(ChatCommand::ReloadHistory);
        }
        if let Some((word, translation)) = actions.add_word {
            self.send_command(ChatCommand::AddVocabulary { word, translation });
        }
        if let Some(word) = actions.remove_word {
            self.send_command(ChatCommand::RemoveVocabulary(word));
        }
        if let Some(message_id) = actions.unstar {
            self.send_command(ChatCommand::ToggleFavorite(message_id));
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        egui::SidePanel::left("account_sidebar")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                let actions = sidebar::render(ui, &mut self.state);
                self.apply_sidebar_actions(actions);
            });

        egui::TopBottomPanel::bottom("input_bar").show(ctx, |ui| {
            match input_bar::render(ui, &mut self.state.input_text) {
                Some(InputAction::Send(content)) => self.send_command(ChatCommand::SendMessage(content)),
                Some(InputAction::Dictate) => self.send_command(ChatCommand::StartDictation),
                None => {}
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Lingua Chat");
            ui.separator();
            if let Some(message_id) = chat_area::render(ui, &self.state) {
                self.send_command(ChatCommand::ToggleFavorite(message_id));
            }
        });

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
