//! Simulated translation over a fixed language table.

use async_trait::async_trait;

use crate::capabilities::{Capability, require_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "translator";

struct Language {
    code: &'static str,
    names: &'static [&'static str],
    tag: &'static str,
    note: &'static str,
}

const LANGUAGES: &[Language] = &[
    Language {
        code: "zh",
        names: &["中文", "chinese"],
        tag: "中文",
        note: "翻译成中文",
    },
    Language {
        code: "en",
        names: &["英文", "英语", "english"],
        tag: "EN",
        note: "translated to English",
    },
    Language {
        code: "ja",
        names: &["日文", "日语", "japanese"],
        tag: "日本語",
        note: "日本語に翻訳",
    },
    Language {
        code: "ko",
        names: &["韩文", "韩语", "korean"],
        tag: "한국어",
        note: "한국어로 번역",
    },
    Language {
        code: "fr",
        names: &["法文", "法语", "french"],
        tag: "Français",
        note: "traduit en français",
    },
    Language {
        code: "de",
        names: &["德文", "德语", "german"],
        tag: "Deutsch",
        note: "ins Deutsche übersetzt",
    },
    Language {
        code: "es",
        names: &["西班牙文", "西班牙语", "spanish"],
        tag: "Español",
        note: "traducido al español",
    },
    Language {
        code: "ru",
        names: &["俄文", "俄语", "russian"],
        tag: "Русский",
        note: "переведено на русский",
    },
];

fn lookup(target: &str) -> Option<&'static Language> {
    let wanted = target.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|lang| lang.code == wanted || lang.names.iter().any(|n| *n == wanted))
}

/// Best-effort script detection. Anything unrecognised is reported as English.
fn detect(text: &str) -> &'static str {
    let has = |range: std::ops::RangeInclusive<char>| text.chars().any(|c| range.contains(&c));
    if has('\u{3040}'..='\u{30ff}') {
        "ja"
    } else if has('\u{4e00}'..='\u{9fa5}') {
        "zh"
    } else if has('\u{ac00}'..='\u{d7af}') {
        "ko"
    } else if has('а'..='я') || has('А'..='Я') || text.contains('ё') {
        "ru"
    } else {
        "en"
    }
}

#[derive(Debug, Default)]
pub struct TranslatorCapability;

impl TranslatorCapability {
    pub fn new() -> Self {
        Self
    }

    fn translate(text: &str, target: &str) -> Result<String, CapabilityError> {
        if text.trim().is_empty() {
            return Err(CapabilityError::InvalidParameters {
                capability: NAME.to_string(),
                reason: "text to translate is empty".to_string(),
            });
        }
        Ok(match lookup(target) {
            Some(lang) => format!("[{}] {} ({})", lang.tag, text, lang.note),
            None => format!("[{}] {} (translated)", target.trim().to_uppercase(), text),
        })
    }
}

#[async_trait]
impl Capability for TranslatorCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Translate text (text, target_language), detect the language of text, list supported languages"
    }

    fn actions(&self) -> &[&'static str] {
        &["translate", "detect_language", "supported_languages"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        match action {
            "translate" => {
                let text = require_str(NAME, params, "text")?;
                let target = require_str(NAME, params, "target_language")?;
                Self::translate(text, target)
            }
            "detect_language" => {
                let text = require_str(NAME, params, "text")?;
                let code = detect(text);
                let name = lookup(code).map_or(code, |lang| lang.names[0]);
                Ok(format!("Detected language: {name} ({code})"))
            }
            "supported_languages" => Ok(LANGUAGES
                .iter()
                .map(|lang| format!("{} ({})", lang.names[0], lang.code))
                .collect::<Vec<_>>()
                .join(", ")),
            other => Err(unknown_action(NAME, other)),
        }
    }
}
