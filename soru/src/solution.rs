use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// School subjects a question can be filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Matematik,
    Fizik,
    Kimya,
    Biyoloji,
    Tarih,
    #[serde(rename = "Coğrafya")]
    Cografya,
    Edebiyat,
    #[serde(rename = "Türkçe")]
    Turkce,
}

impl Subject {
    pub const ALL: [Subject; 8] = [
        Subject::Matematik,
        Subject::Fizik,
        Subject::Kimya,
        Subject::Biyoloji,
        Subject::Tarih,
        Subject::Cografya,
        Subject::Edebiyat,
        Subject::Turkce,
    ];

    /// Display name, as used in prompts.
    pub fn name(self) -> &'static str {
        match self {
            Subject::Matematik => "Matematik",
            Subject::Fizik => "Fizik",
            Subject::Kimya => "Kimya",
            Subject::Biyoloji => "Biyoloji",
            Subject::Tarih => "Tarih",
            Subject::Cografya => "Coğrafya",
            Subject::Edebiyat => "Edebiyat",
            Subject::Turkce => "Türkçe",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subject {
    type Err = String;

    /// Accepts the display name or its ASCII spelling, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold_ascii(s.trim());
        Subject::ALL
            .into_iter()
            .find(|subject| fold_ascii(subject.name()) == wanted)
            .ok_or_else(|| format!("unknown subject: {s}"))
    }
}

fn fold_ascii(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ç' | 'Ç' => 'c',
            'ğ' | 'Ğ' => 'g',
            'ı' | 'I' | 'İ' => 'i',
            'ö' | 'Ö' => 'o',
            'ş' | 'Ş' => 's',
            'ü' | 'Ü' => 'u',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// The option the student marked on the exam sheet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerChoice {
    A,
    B,
    C,
    D,
    E,
    #[default]
    Unspecified,
}

impl AnswerChoice {
    pub const OPTIONS: [AnswerChoice; 5] = [
        AnswerChoice::A,
        AnswerChoice::B,
        AnswerChoice::C,
        AnswerChoice::D,
        AnswerChoice::E,
    ];

    /// Text shown to the model for this choice.
    pub fn prompt_label(self) -> &'static str {
        match self {
            AnswerChoice::A => "A",
            AnswerChoice::B => "B",
            AnswerChoice::C => "C",
            AnswerChoice::D => "D",
            AnswerChoice::E => "E",
            AnswerChoice::Unspecified => "Belirtilmedi",
        }
    }
}

impl FromStr for AnswerChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(AnswerChoice::A),
            "B" => Ok(AnswerChoice::B),
            "C" => Ok(AnswerChoice::C),
            "D" => Ok(AnswerChoice::D),
            "E" => Ok(AnswerChoice::E),
            "" | "-" | "?" => Ok(AnswerChoice::Unspecified),
            other => Err(format!("answer must be one of A-E, got {other}")),
        }
    }
}

/// The four-part tutor answer. Every field is required; a payload missing any
/// of them fails to deserialize as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub simplified_question: String,
    pub solution_steps: String,
    pub final_answer: String,
    pub recommendations: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Uploaded question photo. Clones share one buffer; the bytes are released
/// when the last clone is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageHandle {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl ImageHandle {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of live handles sharing this buffer.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.bytes)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_parses_turkish_and_ascii_names() {
        assert_eq!("Coğrafya".parse::<Subject>(), Ok(Subject::Cografya));
        assert_eq!("cografya".parse::<Subject>(), Ok(Subject::Cografya));
        assert_eq!("TÜRKÇE".parse::<Subject>(), Ok(Subject::Turkce));
        assert_eq!("biyoloji".parse::<Subject>(), Ok(Subject::Biyoloji));
        assert!("Müzik".parse::<Subject>().is_err());
    }

    #[test]
    fn subject_names_round_trip() {
        for subject in Subject::ALL {
            assert_eq!(subject.name().parse::<Subject>(), Ok(subject));
        }
    }

    #[test]
    fn unspecified_answer_label() {
        assert_eq!(AnswerChoice::default().prompt_label(), "Belirtilmedi");
        assert_eq!("c".parse::<AnswerChoice>(), Ok(AnswerChoice::C));
        assert!("F".parse::<AnswerChoice>().is_err());
    }

    #[test]
    fn solution_requires_every_field() {
        let full = r#"{"simplified_question":"q","solution_steps":"s","final_answer":"$1$","recommendations":"r"}"#;
        assert!(serde_json::from_str::<Solution>(full).is_ok());

        let partial = r#"{"simplified_question":"q","solution_steps":"s","final_answer":"$1$"}"#;
        assert!(serde_json::from_str::<Solution>(partial).is_err());
    }

    #[test]
    fn image_buffer_is_shared_and_released() {
        let image = ImageHandle::new(vec![1u8, 2, 3], "image/png");
        let clone = image.clone();
        assert_eq!(image.share_count(), 2);
        drop(clone);
        assert_eq!(image.share_count(), 1);
        assert_eq!(image.bytes(), &[1, 2, 3]);
    }
}
