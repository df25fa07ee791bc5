/// Commands the UI sends down to the chat client loop.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    SendMessage(String),
    SetOnline(bool),
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    SignOut,
    ReloadHistory,
    SetTargetLanguage(String),
    StartDictation,
    /// Star or unstar a message by id.
    ToggleFavorite(String),
    AddVocabulary { word: String, translation: Option<String> },
    RemoveVocabulary(String),
}
