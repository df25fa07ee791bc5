pub mod auth;
pub mod client;
pub mod speech;
pub mod tutor;

pub use auth::{AuthError, AuthProvider, LocalAuthProvider};
pub use client::ChatClient;
pub use speech::{SpeechRecognizer, SpeechSynthesizer, Transcript};
pub use tutor::{TutorClient, TutorService};
