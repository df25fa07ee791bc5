use crate::common::types::{DeliveryStatus, Favorite, Message, VocabularyEntry};

/// Events the chat client loop sends up to the UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageDisplayed { message: Message, status: DeliveryStatus },
    DeliveryUpdated { id: String, status: DeliveryStatus },
    HistoryCleared,
    SignedIn(String),
    SignedOut,
    ConnectivityChanged(bool),
    QueueLength(usize),
    StreakUpdated { current: u32, longest: u32 },
    Notice(String),
    Speaking(bool),
    FavoritesChanged(Vec<Favorite>),
    /// Word list for the current target language.
    VocabularyChanged(Vec<VocabularyEntry>),
}
