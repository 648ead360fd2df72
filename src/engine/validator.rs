use std::collections::HashSet;

use crate::script::{NodeKind, Script};

/// List every dangling edge in `script`, one message per violation.
///
/// Advisory only: nothing is repaired and the graph stays playable up to the
/// first dangling edge.
pub fn validate(script: &Script) -> Vec<String> {
    let ids: HashSet<&str> = script.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut errors = Vec::new();

    if !ids.contains(script.start_node_id.as_str()) {
        errors.push(format!(
            "start node \"{}\" does not exist",
            script.start_node_id
        ));
    }

    for node in &script.nodes {
        match &node.kind {
            NodeKind::Dialogue { next: Some(next) }
                if !next.is_empty() && !ids.contains(next.as_str()) =>
            {
                errors.push(format!(
                    "node \"{}\" has next pointing at missing node \"{}\"",
                    node.id, next
                ));
            }
            NodeKind::Choice { choices } => {
                for choice in choices.iter().filter(|c| !ids.contains(c.next.as_str())) {
                    errors.push(format!(
                        "node \"{}\" option \"{}\" points at missing node \"{}\"",
                        node.id, choice.label, choice.next
                    ));
                }
            }
            _ => {}
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::build;
    use crate::engine::tokenizer::tokenize;

    #[test]
    fn test_demo_is_clean() {
        assert!(validate(&Script::demo()).is_empty());
    }

    #[test]
    fn test_dangling_next() {
        let mut s = Script::demo();
        s.nodes[0].set_next(Some("missing-id".into()));
        let errors = validate(&s);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("demo-n0"));
        assert!(errors[0].contains("missing-id"));
    }

    #[test]
    fn test_missing_start() {
        let mut s = Script::demo();
        s.start_node_id = "gone".into();
        let errors = validate(&s);
        assert_eq!(errors, vec!["start node \"gone\" does not exist".to_string()]);
    }

    #[test]
    fn test_unresolved_options_are_flagged() {
        let s = build(&tokenize("? 问题\n> 选A\n> 选B"), "t", None).unwrap();
        let errors = validate(&s);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("选A"));
        assert!(errors[1].contains("选B"));
    }

    #[test]
    fn test_empty_script_reports_start() {
        let s = build(&tokenize(""), "t", None).unwrap();
        assert_eq!(validate(&s).len(), 1);
    }
}
