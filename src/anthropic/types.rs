//! Corpos de requisição e resposta do endpoint `v1/messages` da Anthropic.
//!
//! Só o subconjunto usado pelo planejador de atividades é modelado.

use serde::{Deserialize, Serialize};

/// Requisição ao endpoint `/v1/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    /// Instrução de sistema opcional; omitida do JSON quando ausente.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user" ou "assistant".
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatena os blocos de texto da resposta, ignorando outros tipos.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.content_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Bloco de conteúdo; o campo `type` do JSON vira `content_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
