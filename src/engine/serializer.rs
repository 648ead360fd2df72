use crate::script::{NodeKind, Script, ScriptNode};

/// Separator written between a speaker and the spoken text.
pub const SPEAKER_SEPARATOR: char = '：';

fn spoken(script: &Script, node: &ScriptNode) -> String {
    match script.speaker_name(node) {
        Some(name) => format!("{name}{SPEAKER_SEPARATOR}{}", node.text),
        None => node.text.clone(),
    }
}

/// Render a script graph as canonical script text.
///
/// Output starts with a `# <title>` heading. A scene heading is written
/// whenever the scene changes, except for the default scene.
pub fn to_text(script: &Script) -> String {
    let mut lines: Vec<String> = vec![format!("# {}", script.title), String::new()];
    let mut last_scene: Option<&str> = None;

    for node in &script.nodes {
        if let Some(scene_id) = node.scene_id.as_deref() {
            if last_scene != Some(scene_id) {
                if let Some(scene) = script.scene(scene_id).filter(|s| !s.is_default()) {
                    lines.push(format!("# {}", scene.name));
                }
                last_scene = Some(scene_id);
            }
        }

        match &node.kind {
            NodeKind::Dialogue { .. } => lines.push(spoken(script, node)),
            NodeKind::Choice { choices } => {
                lines.push(format!("? {}", spoken(script, node)));
                lines.extend(choices.iter().map(|c| format!("> {}", c.label)));
                lines.push(String::new());
            }
            NodeKind::End => lines.push(format!("END {}", node.text)),
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::build;
    use crate::engine::tokenizer::tokenize;

    #[test]
    fn test_demo_text() {
        let text = to_text(&Script::demo());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# 记忆碎片");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "# 深夜书房");
        assert!(lines[3].starts_with("旁白：深夜"));
        assert!(text.contains("? 爱丽丝：我应该怎么做？\n> 立刻去找警察\n> 独自追查真相\n\n"));
        assert!(text.contains("# 黎明窗前"));
        assert!(text.contains("END 结局 A："));
    }

    #[test]
    fn test_default_scene_not_emitted() {
        let s = Script::new_blank();
        assert_eq!(to_text(&s), "# 未命名故事\n\n旁白：故事从这里开始...");
    }

    #[test]
    fn test_narration_and_unknown_speaker() {
        let mut s = build(&tokenize("甲：一\n旁白句"), "t", None).unwrap();
        s.characters.clear();
        assert_eq!(to_text(&s), "# t\n\n一\n旁白句");
    }

    #[test]
    fn test_scene_heading_repeats_on_return() {
        let s = build(&tokenize("# 甲地\n一\n# 乙地\n二\n# 甲地\n三"), "t", None).unwrap();
        assert_eq!(
            to_text(&s),
            "# t\n\n# 甲地\n一\n# 乙地\n二\n# 甲地\n三"
        );
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let demo = Script::demo();
        let rebuilt = build(&tokenize(&to_text(&demo)), &demo.title, Some(&demo)).unwrap();

        assert_eq!(rebuilt.id, demo.id);
        assert_eq!(rebuilt.nodes.len(), demo.nodes.len());
        for (a, b) in demo.nodes.iter().zip(&rebuilt.nodes) {
            assert_eq!(a.type_name(), b.type_name());
            assert_eq!(a.text, b.text);
            assert_eq!(a.speaker, b.speaker, "speaker ids stay stable");
            assert_eq!(a.scene_id, b.scene_id, "scene ids stay stable");
            let la: Vec<&str> = a.choices().iter().map(|c| c.label.as_str()).collect();
            let lb: Vec<&str> = b.choices().iter().map(|c| c.label.as_str()).collect();
            assert_eq!(la, lb);
        }
        assert_eq!(to_text(&rebuilt), to_text(&demo));
    }
}
