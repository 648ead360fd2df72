use std::fmt;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

/// Colons that separate a speaker name from the spoken line.
const SPEAKER_COLONS: [char; 2] = [':', '：'];

/// The colon must sit strictly before this char offset.
const MAX_SPEAKER_PREFIX: usize = 20;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Scene,
    Dialogue,
    ChoicePrompt,
    ChoiceOption,
    End,
    Comment,
    Empty,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Scene => "scene",
            TokenKind::Dialogue => "dialogue",
            TokenKind::ChoicePrompt => "choice_prompt",
            TokenKind::ChoiceOption => "choice_option",
            TokenKind::End => "end",
            TokenKind::Comment => "comment",
            TokenKind::Empty => "empty",
        }
    }

    /// Tokens the builder skips without touching any state.
    pub fn is_transparent(self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::Empty)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineToken {
    /// Zero-based source line.
    pub line: usize,
    pub kind: TokenKind,
    /// Speaker name as written, for dialogue and choice prompts.
    pub speaker: Option<String>,
    pub text: String,
}

impl LineToken {
    fn new(line: usize, kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            speaker: None,
            text: text.into(),
        }
    }

    fn spoken(line: usize, kind: TokenKind, body: &str) -> Self {
        match split_speaker(body) {
            Some((speaker, text)) => Self {
                line,
                kind,
                speaker: Some(speaker.to_string()),
                text: text.to_string(),
            },
            None => Self::new(line, kind, body),
        }
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| {
        Regex::new(r"^[\x{4e00}-\x{9fa5}A-Za-z0-9_\x{00b7}]{1,15}$").expect("name pattern is valid")
    })
}

fn end_pattern() -> &'static Regex {
    static END: OnceLock<Regex> = OnceLock::new();
    END.get_or_init(|| Regex::new(r"(?i)^END(?:[^A-Za-z0-9_]|$)").expect("end pattern is valid"))
}

/// Split `name：text` when the prefix looks like a character name.
///
/// Prefixes that are too long or contain anything outside the name alphabet
/// (timestamps, URLs with spaces, sentences) are left alone.
pub fn split_speaker(line: &str) -> Option<(&str, &str)> {
    let (char_idx, (byte_idx, colon)) = line
        .char_indices()
        .enumerate()
        .find(|(_, (_, c))| SPEAKER_COLONS.contains(c))?;

    if char_idx == 0 || char_idx >= MAX_SPEAKER_PREFIX {
        return None;
    }

    let speaker = line[..byte_idx].trim();
    if !name_pattern().is_match(speaker) {
        return None;
    }
    Some((speaker, line[byte_idx + colon.len_utf8()..].trim()))
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Classify a single line. Never fails: anything unrecognised is narration.
pub fn classify_line(line: usize, raw: &str) -> LineToken {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return LineToken::new(line, TokenKind::Empty, "");
    }
    if trimmed.starts_with("//") {
        return LineToken::new(line, TokenKind::Comment, trimmed);
    }
    if let Some(rest) = trimmed.strip_prefix('#') {
        return LineToken::new(line, TokenKind::Scene, rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix('>') {
        return LineToken::new(line, TokenKind::ChoiceOption, rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix('?') {
        return LineToken::spoken(line, TokenKind::ChoicePrompt, rest.trim());
    }
    if end_pattern().is_match(trimmed) {
        // "END" is ASCII, so the keyword is exactly three bytes.
        return LineToken::new(line, TokenKind::End, trimmed[3..].trim());
    }

    LineToken::spoken(line, TokenKind::Dialogue, trimmed)
}

/// Split `text` on newlines and classify every line, one token per line.
pub fn tokenize(text: &str) -> Vec<LineToken> {
    let tokens: Vec<LineToken> = text
        .split('\n')
        .enumerate()
        .map(|(i, raw)| classify_line(i, raw))
        .collect();

    trace!("Tokenized {} lines", tokens.len());
    tokens
}
