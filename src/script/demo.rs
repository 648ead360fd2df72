use crate::script::{now_millis, Character, Choice, Scene, Script, ScriptNode};

fn line(id: &str, scene: &str, speaker: &str, text: &str, next: &str) -> ScriptNode {
    let mut node = ScriptNode::dialogue(id, Some(scene.into()), Some(speaker.into()), text);
    node.set_next(Some(next.into()));
    node
}

fn ending(id: &str, scene: &str, text: &str) -> ScriptNode {
    ScriptNode::end(id, Some(scene.into()), text)
}

// ---------------------------------------------------------------------------
// "Memory fragments" demo story
// ---------------------------------------------------------------------------

/// Built-in branching story: four scenes, three characters, two choices and
/// three endings, with every choice target wired.
pub fn memory_fragments() -> Script {
    let now = now_millis();

    let scenes = vec![
        Scene {
            id: "scene-night".into(),
            name: "深夜书房".into(),
            background: "linear-gradient(135deg, #1a1a2e 0%, #16213e 50%, #0f3460 100%)".into(),
        },
        Scene {
            id: "scene-dawn".into(),
            name: "黎明窗前".into(),
            background: "linear-gradient(135deg, #f093fb 0%, #f5576c 50%, #4facfe 100%)".into(),
        },
        Scene {
            id: "scene-forest".into(),
            name: "幽暗森林".into(),
            background: "linear-gradient(135deg, #134e5e 0%, #71b280 100%)".into(),
        },
        Scene {
            id: "scene-end".into(),
            name: "真相之地".into(),
            background: "linear-gradient(135deg, #0c0c0c 0%, #1a1a3e 50%, #000 100%)".into(),
        },
    ];

    let characters = vec![
        Character {
            id: "char-narrator".into(),
            name: "旁白".into(),
            color: "#6366f1".into(),
        },
        Character {
            id: "char-alice".into(),
            name: "爱丽丝".into(),
            color: "#ec4899".into(),
        },
        Character {
            id: "char-shadow".into(),
            name: "影子".into(),
            color: "#8b5cf6".into(),
        },
    ];

    let nodes = vec![
        // --- Opening: the study at night ---
        line(
            "demo-n0",
            "scene-night",
            "char-narrator",
            "深夜，书房中蜡烛无风自灭。爱丽丝发现桌上多了一封陌生的信件。",
            "demo-n1",
        ),
        line(
            "demo-n1",
            "scene-night",
            "char-alice",
            "（颤抖着打开信封）这……这是什么？",
            "demo-n2",
        ),
        line(
            "demo-n2",
            "scene-night",
            "char-narrator",
            "信纸上只写了一行字——「你的记忆是假的。」",
            "demo-n3",
        ),
        line(
            "demo-n3",
            "scene-night",
            "char-alice",
            "谁……谁写的？这不可能是真的。",
            "demo-n4",
        ),
        ScriptNode::choice(
            "demo-n4",
            Some("scene-night".into()),
            Some("char-alice".into()),
            "我应该怎么做？",
            vec![
                Choice {
                    label: "立刻去找警察".into(),
                    next: "demo-n5".into(),
                },
                Choice {
                    label: "独自追查真相".into(),
                    next: "demo-n8".into(),
                },
            ],
        ),
        // --- Route A: the police ---
        line(
            "demo-n5",
            "scene-dawn",
            "char-narrator",
            "天刚破晓，爱丽丝赶到警察局。然而警官看了看信纸，轻描淡写地说——",
            "demo-n6",
        ),
        line(
            "demo-n6",
            "scene-dawn",
            "char-narrator",
            "「女士，这只是一个玩笑。」爱丽丝望着窗外渐亮的天空，心里明白——有些真相，体制帮不了你。",
            "demo-n7",
        ),
        ending(
            "demo-n7",
            "scene-dawn",
            "结局 A：爱丽丝选择相信体制，却永远带着那个疑问入眠。",
        ),
        // --- Route B: alone into the forest ---
        line(
            "demo-n8",
            "scene-forest",
            "char-narrator",
            "爱丽丝循着信封上的墨迹气味，走进了城郊的幽暗森林。",
            "demo-n9",
        ),
        line(
            "demo-n9",
            "scene-forest",
            "char-narrator",
            "树影深处，一个与爱丽丝一模一样的身影站在那里。",
            "demo-n10",
        ),
        line(
            "demo-n10",
            "scene-forest",
            "char-shadow",
            "终于来了。我等你很久了……另一个我。",
            "demo-n11",
        ),
        ScriptNode::choice(
            "demo-n11",
            Some("scene-forest".into()),
            Some("char-alice".into()),
            "你……你是谁？",
            vec![
                Choice {
                    label: "「我相信你，告诉我真相。」".into(),
                    next: "demo-n12".into(),
                },
                Choice {
                    label: "「你是幻觉，我不会上当。」".into(),
                    next: "demo-n14".into(),
                },
            ],
        ),
        // --- Route B-1: trust the shadow ---
        line(
            "demo-n12",
            "scene-end",
            "char-shadow",
            "我是你被抹去的那部分记忆。我们原本是一个人——在那场事故之后，他们把我们分开了。",
            "demo-n13",
        ),
        ending(
            "demo-n13",
            "scene-end",
            "结局 B：爱丽丝与影子合而为一，找回了完整的自己。真相，有时比遗忘更沉重。",
        ),
        // --- Route B-2: refuse the shadow ---
        line(
            "demo-n14",
            "scene-forest",
            "char-shadow",
            "（叹气）好吧。等你想起来的那天……记得回来找我。",
            "demo-n15",
        ),
        ending(
            "demo-n15",
            "scene-forest",
            "结局 C：爱丽丝独自走出森林，那个影子消散在晨雾里。遗忘，也是一种选择。",
        ),
    ];

    Script {
        id: "demo-script".into(),
        title: "记忆碎片".into(),
        characters,
        scenes,
        nodes,
        start_node_id: "demo-n0".into(),
        created_at: now,
        updated_at: now,
    }
}
