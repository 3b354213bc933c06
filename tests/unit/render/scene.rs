use super::*;
use crate::clip::ClipNode;

fn transition_tree() -> ClipTree {
    let mut t = ClipTree::new(Canvas {
        width: 64,
        height: 36,
    });
    t.set_root_duration(20.0);
    let root = t.root();
    let g = t
        .add_child(
            root,
            ClipNode::new(ClipKind::Group, "g").with_conf(ClipConf::default().with_duration(20.0)),
        )
        .unwrap();
    for (kind, id, dur) in [
        (ClipKind::Image, "a", 4.0),
        (ClipKind::Transition, "tr", 2.0),
        (ClipKind::Image, "b", 3.0),
    ] {
        t.add_child(
            g,
            ClipNode::new(kind, id).with_conf(ClipConf::default().with_duration(dur)),
        )
        .unwrap();
    }
    t.add_child(g, ClipNode::new(ClipKind::Audio, "music"))
        .unwrap();
    let hidden = t
        .add_child(root, ClipNode::new(ClipKind::Group, "hidden").with_active(false))
        .unwrap();
    t.add_child(hidden, ClipNode::new(ClipKind::Text, "secret"))
        .unwrap();
    t.assign_z_indices();
    t.annotate_all();
    t
}

fn ids(state: &FrameState<'_>) -> Vec<String> {
    state.layers.iter().map(|l| l.spec.id.clone()).collect()
}

#[test]
fn snapshot_keeps_only_active_drawables() {
    let snap = SceneSnapshot::from_tree(&transition_tree()).unwrap();
    let mut names: Vec<&str> = snap.layers().iter().map(|l| l.id.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "tr"]);
    assert_eq!(snap.canvas().width, 64);
}

#[test]
fn first_half_of_transition_shows_outgoing_clip() {
    let snap = SceneSnapshot::from_tree(&transition_tree()).unwrap();
    let state = snap.frame_state(FrameIndex(35), 3.5);
    assert_eq!(ids(&state), vec!["a", "b", "tr"]);
    let visible: Vec<bool> = state.layers.iter().map(|l| l.visible).collect();
    assert_eq!(visible, vec![true, false, true]);
    assert_eq!(state.layers[2].progress, 0.25);
}

#[test]
fn second_half_of_transition_shows_incoming_clip() {
    let snap = SceneSnapshot::from_tree(&transition_tree()).unwrap();
    let state = snap.frame_state(FrameIndex(45), 4.5);
    let visible: Vec<(String, bool)> = state
        .layers
        .iter()
        .map(|l| (l.spec.id.clone(), l.visible))
        .collect();
    assert_eq!(
        visible,
        vec![
            ("a".to_string(), false),
            ("b".to_string(), true),
            ("tr".to_string(), true)
        ]
    );
}

#[test]
fn outside_every_window_nothing_is_drawn() {
    let snap = SceneSnapshot::from_tree(&transition_tree()).unwrap();
    assert!(snap.frame_state(FrameIndex(0), 15.0).layers.is_empty());
}

#[test]
fn unannotated_tree_is_rejected() {
    let mut t = ClipTree::new(Canvas {
        width: 8,
        height: 8,
    });
    let root = t.root();
    t.add_child(root, ClipNode::new(ClipKind::Image, "a"))
        .unwrap();
    let err = SceneSnapshot::from_tree(&t).unwrap_err();
    assert!(matches!(err, MontageError::State(_)));
}
