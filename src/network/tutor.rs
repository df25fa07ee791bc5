use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Message, Sender};
use crate::config::TutorConfig;
use crate::pipeline::sanitizer::decode_entities;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("tutor request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tutor endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("tutor returned no text")]
    EmptyReply,
}

/// The generative-text collaborator.
#[async_trait]
pub trait TutorClient: Send + Sync {
    async fn reply(
        &self,
        context: &[Message],
        target_language: &str,
        native_language: &str,
    ) -> Result<String, TutorError>;
}

// generateContent wire format
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct HttpTutorClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTutorClient {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, TutorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

fn system_prompt(target_language: &str, native_language: &str) -> String {
    format!(
        "You are a friendly language tutor. Converse with the student in the language \
         with code `{target_language}`, keeping replies short and at their level. When the \
         student makes a mistake, add a brief correction in the language with code \
         `{native_language}`."
    )
}

fn build_request(context: &[Message], target_language: &str, native_language: &str) -> GenerateRequest {
    let contents = context
        .iter()
        .map(|message| Content {
            role: Some(
                match message.sender {
                    Sender::User => "user",
                    Sender::Ai => "model",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: decode_entities(&message.text),
            }],
        })
        .collect();

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_prompt(target_language, native_language),
            }],
        },
        contents,
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, TutorError> {
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim();
    if text.is_empty() {
        Err(TutorError::EmptyReply)
    } else {
        Ok(text.to_string())
    }
}

#[async_trait]
impl TutorClient for HttpTutorClient {
    async fn reply(
        &self,
        context: &[Message],
        target_language: &str,
        native_language: &str,
    ) -> Result<String, TutorError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&build_request(context, target_language, native_language));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TutorError::Status(response.status()));
        }
        extract_text(response.json::<GenerateResponse>().await?)
    }
}

const CANNED_ES: &[&str] = &[
    "¡Muy bien! ¿Puedes contarme más?",
    "Interesante. ¿Qué hiciste hoy?",
    "¡Excelente! Sigamos practicando.",
];
const CANNED_FR: &[&str] = &[
    "Très bien ! Peux-tu m'en dire plus ?",
    "Intéressant. Qu'as-tu fait aujourd'hui ?",
    "Excellent ! Continuons à pratiquer.",
];
const CANNED_DE: &[&str] = &[
    "Sehr gut! Kannst du mir mehr erzählen?",
    "Interessant. Was hast du heute gemacht?",
    "Ausgezeichnet! Lass uns weiter üben.",
];
const CANNED_IT: &[&str] = &[
    "Molto bene! Puoi dirmi di più?",
    "Interessante. Cosa hai fatto oggi?",
    "Eccellente! Continuiamo a esercitarci.",
];
const CANNED_PT: &[&str] = &[
    "Muito bem! Pode me contar mais?",
    "Interessante. O que você fez hoje?",
    "Excelente! Vamos continuar praticando.",
];
const CANNED_JA: &[&str] = &[
    "とても良いですね！もっと教えてください。",
    "面白いですね。今日は何をしましたか？",
    "素晴らしい！練習を続けましょう。",
];
const CANNED_EN: &[&str] = &[
    "Great! Can you tell me more?",
    "Interesting. What did you do today?",
    "Excellent! Let's keep practicing.",
];

fn canned_table(target_language: &str) -> &'static [&'static str] {
    let code = target_language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match code.as_str() {
        "es" => CANNED_ES,
        "fr" => CANNED_FR,
        "de" => CANNED_DE,
        "it" => CANNED_IT,
        "pt" => CANNED_PT,
        "ja" => CANNED_JA,
        _ => CANNED_EN,
    }
}

/// Tutor replies with a local fallback: any failure of the remote tutor
/// (or its absence) degrades to a canned response in the target language.
#[derive(Clone)]
pub struct TutorService {
    client: Option<Arc<dyn TutorClient>>,
}

impl TutorService {
    pub fn new(client: Option<Arc<dyn TutorClient>>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &TutorConfig) -> Self {
        let Some(endpoint) = config.endpoint.as_deref() else {
            log::info!("No tutor endpoint configured; using canned replies");
            return Self::new(None);
        };

        match HttpTutorClient::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        ) {
            Ok(client) => Self::new(Some(Arc::new(client))),
            Err(err) => {
                log::warn!("Failed to build tutor client ({err}); using canned replies");
                Self::new(None)
            }
        }
    }

    pub async fn reply(&self, context: &[Message], target_language: &str, native_language: &str) -> String {
        if let Some(client) = &self.client {
            match client.reply(context, target_language, native_language).await {
                Ok(text) => return text,
                Err(err) => log::warn!("Tutor unavailable, falling back to canned reply: {err}"),
            }
        }
        canned_reply(context.len(), target_language).to_string()
    }
}

pub fn canned_reply(turn: usize, target_language: &str) -> &'static str {
    let table = canned_table(target_language);
    table[turn % table.len()]
}
