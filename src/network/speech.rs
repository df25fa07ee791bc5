//! Speech ports. The desktop build ships no recognizer binding: dictation is
//! available only when an embedder supplies a `SpeechRecognizer` through
//! `AppContext::recognizer`. Synthesis falls back to `LoggingSynthesizer`.

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::common::ChatCommand;

/// One recognizer result; partial results may be superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub is_final: bool,
}

/// Speech-to-text collaborator. Each call to `listen` starts a fresh,
/// lazily driven stream of transcripts for one utterance.
pub trait SpeechRecognizer: Send + Sync {
    fn listen(&self, language: &str) -> BoxStream<'static, Transcript>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Error(String),
}

pub type SpeechCallback = Box<dyn Fn(SpeechEvent) + Send + Sync>;

/// Text-to-speech collaborator. Fire and forget; progress arrives through
/// the callback.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, language: &str, on_event: SpeechCallback);
}

/// Desktop fallback with no audio device binding: logs the utterance and
/// reports an immediate start and end.
pub struct LoggingSynthesizer;

impl SpeechSynthesizer for LoggingSynthesizer {
    fn speak(&self, text: &str, language: &str, on_event: SpeechCallback) {
        log::info!("[tts:{language}] {text}");
        on_event(SpeechEvent::Started);
        on_event(SpeechEvent::Ended);
    }
}

/// Submits each final transcript as a chat message. Returns how many were
/// forwarded; stops early if the command channel closes.
pub async fn forward_final_transcripts(
    mut transcripts: BoxStream<'static, Transcript>,
    commands: mpsc::Sender<ChatCommand>,
) -> usize {
    let mut forwarded = 0;
    while let Some(transcript) = transcripts.next().await {
        if !transcript.is_final {
            log::debug!("Partial transcript: {}", transcript.text);
            continue;
        }
        let text = transcript.text.trim();
        if text.is_empty() {
            continue;
        }
        if commands
            .send(ChatCommand::SendMessage(text.to_string()))
            .await
            .is_err()
        {
            log::warn!("Chat loop closed; dropping transcript");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn only_final_non_empty_transcripts_are_submitted() {
        let transcripts = stream::iter(vec![
            Transcript { text: "ho".into(), is_final: false },
            Transcript { text: "hola".into(), is_final: true },
            Transcript { text: "  ".into(), is_final: true },
            Transcript { text: "adiós ".into(), is_final: true },
        ])
        .boxed();
        let (tx, mut rx) = mpsc::channel(8);

        let forwarded = forward_final_transcripts(transcripts, tx).await;

        assert_eq!(forwarded, 2);
        let mut sent = Vec::new();
        while let Ok(ChatCommand::SendMessage(text)) = rx.try_recv() {
            sent.push(text);
        }
        assert_eq!(sent, vec!["hola", "adiós"]);
    }

    #[test]
    fn logging_synthesizer_reports_start_then_end() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        LoggingSynthesizer.speak(
            "¡Hola!",
            "es",
            Box::new(move |event| sink.lock().unwrap().push(event)),
        );

        assert_eq!(
            *events.lock().unwrap(),
            vec![SpeechEvent::Started, SpeechEvent::Ended]
        );
    }
}
