//! Text ⇄ graph conversion.
//!
//!   text ──tokenize──▶ tokens ──build──▶ Script ──to_text──▶ text
//!
//! The graph is the authoritative state. Text is re-derived from it whenever
//! it changes for reasons other than typing.

pub mod builder;
pub mod serializer;
pub mod tokenizer;
pub mod validator;

use crate::error::BuildError;
use crate::script::{Script, DEFAULT_TITLE};

pub use builder::build;
pub use serializer::to_text;
pub use tokenizer::{tokenize, LineToken, TokenKind};
pub use validator::validate;

/// The document title: a non-empty heading that comes before any content.
pub fn document_title(tokens: &[LineToken]) -> Option<&str> {
    tokens
        .iter()
        .find(|t| !t.kind.is_transparent())
        .filter(|t| t.kind == TokenKind::Scene && !t.text.is_empty())
        .map(|t| t.text.as_str())
}

/// Parse an editable document into a graph, the way the editing surface does.
///
/// The leading heading names the script. Without one the previous title is
/// kept, falling back to the default title.
pub fn parse_document(text: &str, previous: Option<&Script>) -> Result<Script, BuildError> {
    let tokens = tokenize(text);
    let title = document_title(&tokens)
        .or(previous.map(|p| p.title.as_str()))
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    build(&tokens, &title, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_leading_heading() {
        let s = parse_document("// header\n# 我的故事\n\n# 森林\n甲：hi", None).unwrap();
        assert_eq!(s.title, "我的故事");
        let names: Vec<&str> = s.scenes.iter().map(|sc| sc.name.as_str()).collect();
        assert_eq!(names, vec![crate::script::DEFAULT_SCENE_NAME, "森林"]);
    }

    #[test]
    fn test_title_falls_back() {
        let prev = parse_document("# 旧标题\n甲：一", None).unwrap();
        let s = parse_document("甲：二\n# 森林\n乙：三", Some(&prev)).unwrap();
        assert_eq!(s.title, "旧标题");
        assert_eq!(s.scenes.len(), 2);

        let fresh = parse_document("甲：二", None).unwrap();
        assert_eq!(fresh.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_parse_then_text_is_a_fixpoint() {
        let source = "# 标题\n\n# 森林\n甲：你好\n? 乙：去哪？\n> 东\n> 西\n\n丙：走吧\nEND 完";
        let first = parse_document(source, None).unwrap();
        let text = to_text(&first);
        assert_eq!(text, source);

        let second = parse_document(&text, Some(&first)).unwrap();
        assert_eq!(to_text(&second), text);
        assert_eq!(first.characters, second.characters);
        assert_eq!(first.scenes, second.scenes);
    }
}
