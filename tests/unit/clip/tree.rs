use super::*;
use crate::clip::ClipConf;
use crate::foundation::core::TimeWindow;

fn tree(root_duration: f64) -> ClipTree {
    let mut t = ClipTree::new(Canvas {
        width: 640,
        height: 360,
    });
    t.set_root_duration(root_duration);
    t
}

fn add(t: &mut ClipTree, parent: ClipId, kind: ClipKind, id: &str, conf: ClipConf) -> ClipId {
    t.add_child(parent, ClipNode::new(kind, id).with_conf(conf))
        .unwrap()
}

#[test]
fn unset_start_chains_to_previous_sibling() {
    let mut t = tree(20.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(20.0));
    let a = add(&mut t, g, ClipKind::Image, "a", ClipConf::default().with_duration(2.0));
    let b = add(&mut t, g, ClipKind::Image, "b", ClipConf::default().with_duration(3.0));
    let c = add(&mut t, g, ClipKind::Text, "c", ClipConf::default().with_duration(1.0));

    assert_eq!(t.start_time(a), 0.0);
    assert_eq!(t.start_time(b), t.end_time(a));
    assert_eq!(t.start_time(c), t.end_time(b));
    assert_eq!(t.start_time(c), 5.0);
    assert_eq!(t.prev_sibling(a), None);
    assert_eq!(t.next_sibling(b), Some(c));
}

#[test]
fn end_never_precedes_start() {
    let mut t = tree(10.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(10.0));
    let backwards = add(
        &mut t,
        g,
        ClipKind::Image,
        "backwards",
        ClipConf::default().with_start(8.0).with_end(5.0),
    );
    // The inverted end is ignored and the node falls back to 100% of the parent.
    assert_eq!(t.end_time(backwards), 10.0);

    let late = add(
        &mut t,
        g,
        ClipKind::Image,
        "late",
        ClipConf::default().with_start(12.0),
    );
    assert!(t.end_time(late) >= t.start_time(late));
    assert_eq!(t.end_time(late), 15.0);

    let scene = add(&mut t, root, ClipKind::Scene, "s", ClipConf::default().with_duration(4.0));
    let past = add(
        &mut t,
        scene,
        ClipKind::Image,
        "past",
        ClipConf::default().with_start(6.0).with_duration(1.0),
    );
    assert_eq!(t.start_time(past), 6.0);
    assert_eq!(t.end_time(past), 6.0);
}

#[test]
fn percentage_duration_follows_parent() {
    let mut t = tree(30.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(7.5));
    let full = add(&mut t, g, ClipKind::Image, "full", ClipConf::default().with_duration("100%"));
    assert!((t.duration(full) - t.duration(g)).abs() < 1e-3);
}

#[test]
fn half_end_in_ten_second_container() {
    let mut t = tree(10.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(10.0));
    let child = add(&mut t, g, ClipKind::Image, "child", ClipConf::default().with_end("50%"));
    assert_eq!(t.start_time(child), 0.0);
    assert_eq!(t.end_time(child), 5.0);
}

#[test]
fn percent_plus_offset_start() {
    let mut t = tree(20.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(20.0));
    let child = add(&mut t, g, ClipKind::Image, "child", ClipConf::default().with_start("10%+1"));
    assert_eq!(t.start_time(child), 3.0);
}

#[test]
fn bounded_container_clamps_children() {
    let mut t = tree(20.0);
    let root = t.root();
    let scene = add(&mut t, root, ClipKind::Scene, "s", ClipConf::default().with_duration(4.0));
    let long = add(&mut t, scene, ClipKind::Image, "long", ClipConf::default().with_duration(10.0));
    assert_eq!(t.real_end_time(long), 10.0);
    assert_eq!(t.end_time(long), 4.0);

    let group = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(4.0));
    let free = add(&mut t, group, ClipKind::Image, "free", ClipConf::default().with_duration(10.0));
    assert_eq!(t.end_time(free), 10.0);
}

#[test]
fn three_second_fallback_when_nothing_resolves() {
    let mut t = tree(0.0);
    let root = t.root();
    let img = add(&mut t, root, ClipKind::Image, "img", ClipConf::default());
    assert_eq!(t.end_time(img), FALLBACK_DURATION);

    let garbage = add(
        &mut t,
        root,
        ClipKind::Image,
        "garbage",
        ClipConf::default().with_duration("soon"),
    );
    assert_eq!(t.start_time(garbage), 0.0);
    assert_eq!(t.end_time(garbage), 3.0);
}

#[test]
fn root_children_are_parallel_layers() {
    let mut t = tree(10.0);
    let root = t.root();
    add(&mut t, root, ClipKind::Spine, "spine", ClipConf::default());
    let music = add(&mut t, root, ClipKind::Audio, "music", ClipConf::default().with_loop(true));
    assert_eq!(t.prev_sibling(music), t.spine());
    assert_eq!(t.start_time(music), 0.0);
    assert_eq!(t.end_time(music), 10.0);
}

#[test]
fn media_default_to_material_length_unless_looping() {
    let mut t = tree(12.0);
    let root = t.root();
    let v = add(&mut t, root, ClipKind::Video, "v", ClipConf::default());
    t.set_media_length(v, Some(6.0));
    assert_eq!(t.end_time(v), 6.0);

    let looped = add(
        &mut t,
        root,
        ClipKind::Video,
        "looped",
        ClipConf::default().with_start(0.0).with_loop(true),
    );
    t.set_media_length(looped, Some(6.0));
    assert_eq!(t.end_time(looped), 12.0);

    // Gifs loop unless told otherwise.
    let gif = add(&mut t, root, ClipKind::Gif, "gif", ClipConf::default().with_start(0.0));
    t.set_media_length(gif, Some(2.0));
    assert_eq!(t.end_time(gif), 12.0);

    let unknown = add(&mut t, root, ClipKind::Audio, "unknown", ClipConf::default().with_start(0.0));
    assert_eq!(t.end_time(unknown), FALLBACK_DURATION);
}

#[test]
fn transition_overlaps_neighbours() {
    let mut t = tree(20.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(20.0));
    let a = add(&mut t, g, ClipKind::Image, "a", ClipConf::default().with_duration(4.0));
    let tr = add(&mut t, g, ClipKind::Transition, "tr", ClipConf::default().with_duration(2.0));
    let b = add(&mut t, g, ClipKind::Image, "b", ClipConf::default().with_duration(3.0));
    t.assign_z_indices();
    t.annotate_all();

    assert_eq!(t.start_time(tr), 3.0);
    assert_eq!(t.end_time(tr), 4.0);
    assert_eq!(t.start_time(b), 4.0);

    let ta = *t.node(a).timing().unwrap();
    let ttr = *t.node(tr).timing().unwrap();
    let tb = *t.node(b).timing().unwrap();

    assert_eq!(ttr.draw, TimeWindow::new(3.0, 5.0));
    assert_eq!(ttr.show, ttr.draw);

    assert_eq!(tb.show.start, tb.draw.start + 1.0);
    assert_eq!(ta.show.end, 4.0);
    assert_eq!(ta.draw.end, 5.0);

    // Exactly one neighbour is composited during each half.
    for t_half in [3.5, 4.5] {
        let shown = [ta, tb].iter().filter(|x| x.show.contains(t_half)).count();
        assert_eq!(shown, 1, "at {t_half}");
    }

    let za = t.node(a).z_index();
    let zb = t.node(b).z_index();
    assert_eq!(t.node(tr).z_index(), za.max(zb) + 1);
}

#[test]
fn default_transition_duration() {
    let mut t = tree(20.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(20.0));
    add(&mut t, g, ClipKind::Image, "a", ClipConf::default().with_duration(4.0));
    let tr = add(&mut t, g, ClipKind::Transition, "tr", ClipConf::default());
    assert_eq!(t.duration(tr), DEFAULT_TRANSITION_DURATION);
    assert_eq!(t.start_time(tr), 3.5);
}

#[test]
fn annotate_is_idempotent() {
    let mut t = tree(10.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_start(1.0));
    add(&mut t, g, ClipKind::Image, "a", ClipConf::default().with_end("50%"));
    add(&mut t, g, ClipKind::Transition, "tr", ClipConf::default());
    add(&mut t, g, ClipKind::Text, "b", ClipConf::default().with_duration("10%+0.25"));

    t.annotate_all();
    let first: Vec<_> = t
        .all_nodes(root)
        .into_iter()
        .map(|id| *t.node(id).timing().unwrap())
        .collect();
    t.annotate_all();
    let second: Vec<_> = t
        .all_nodes(root)
        .into_iter()
        .map(|id| *t.node(id).timing().unwrap())
        .collect();
    assert_eq!(first, second);
}

#[test]
fn absolute_times_accumulate_and_round() {
    let mut t = tree(10.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_start(1.0001));
    let child = add(
        &mut t,
        g,
        ClipKind::Image,
        "c",
        ClipConf::default().with_start(0.3333).with_duration(1.0),
    );
    assert_eq!(t.abs_start_time(child), 1.333);
    assert_eq!(t.abs_end_time(child), 2.333);
}

#[test]
fn z_indices_follow_tree_order_and_base() {
    let mut t = tree(10.0);
    let root = t.root();
    let mut raised = ClipConf::default();
    raised.z_index = Some(2.0);
    let g = add(&mut t, root, ClipKind::Group, "g", raised);
    let a = add(&mut t, g, ClipKind::Image, "a", ClipConf::default());
    let b = add(&mut t, root, ClipKind::Image, "b", ClipConf::default());
    let mut huge = ClipConf::default();
    huge.z_index = Some(5000.0);
    let c = add(&mut t, root, ClipKind::Image, "c", huge);
    t.assign_z_indices();

    assert_eq!(t.node(g).z_index(), 2000);
    assert_eq!(t.node(a).z_index(), 2001);
    assert_eq!(t.node(b).z_index(), 2);
    assert_eq!(t.node(c).z_index(), 999_000 + 3);
}

#[test]
fn removal_destroys_subtree_and_relinks_siblings() {
    let mut t = tree(10.0);
    let root = t.root();
    let holder = add(&mut t, root, ClipKind::Group, "holder", ClipConf::default());
    let a = add(&mut t, holder, ClipKind::Image, "a", ClipConf::default().with_duration(1.0));
    let g = add(&mut t, holder, ClipKind::Group, "g", ClipConf::default().with_duration(2.0));
    let inner = add(&mut t, g, ClipKind::Text, "inner", ClipConf::default());
    let c = add(&mut t, holder, ClipKind::Image, "c", ClipConf::default());

    assert_eq!(t.start_time(c), 3.0);
    t.remove(g).unwrap();
    assert!(t.get(g).is_none());
    assert!(t.get(inner).is_none());
    assert_eq!(t.prev_sibling(c), Some(a));
    assert_eq!(t.start_time(c), 1.0);
    assert!(t.remove(root).is_err());
    assert!(t.find("inner").is_none());
}

#[test]
fn sibling_links_follow_inserts_and_removals() {
    let mut t = tree(10.0);
    let root = t.root();
    let g = add(&mut t, root, ClipKind::Group, "g", ClipConf::default().with_duration(10.0));
    let a = add(&mut t, g, ClipKind::Image, "a", ClipConf::default().with_duration(1.0));
    let c = add(&mut t, g, ClipKind::Image, "c", ClipConf::default().with_duration(1.0));
    let b = t
        .insert_child(
            g,
            1,
            ClipNode::new(ClipKind::Image, "b").with_conf(ClipConf::default().with_duration(2.0)),
        )
        .unwrap();

    assert_eq!(t.next_sibling(a), Some(b));
    assert_eq!(t.prev_sibling(c), Some(b));
    assert_eq!(t.start_time(c), 3.0);

    t.remove(a).unwrap();
    assert_eq!(t.prev_sibling(b), None);
    assert_eq!(t.next_sibling(b), Some(c));
    assert_eq!(t.next_sibling(c), None);
    assert_eq!(t.start_time(c), 2.0);
}

#[test]
fn structural_rules_are_enforced() {
    let mut t = tree(10.0);
    let root = t.root();
    let img = add(&mut t, root, ClipKind::Image, "img", ClipConf::default());
    assert!(t.add_child(img, ClipNode::new(ClipKind::Text, "t")).is_err());
    assert!(t.add_child(root, ClipNode::new(ClipKind::Text, "img")).is_err());
    assert!(t.add_child(root, ClipNode::new(ClipKind::Root, "r2")).is_err());

    let video = add(&mut t, root, ClipKind::Video, "v", ClipConf::default());
    assert!(t.add_child(video, ClipNode::new(ClipKind::Audio, "v_audio")).is_ok());
    assert!(t.add_child(video, ClipNode::new(ClipKind::Image, "v_img")).is_err());
}

#[test]
fn spine_duration_tracks_children() {
    let mut t = tree(0.0);
    let root = t.root();
    let spine = add(&mut t, root, ClipKind::Spine, "spine", ClipConf::default());
    add(&mut t, spine, ClipKind::Image, "a", ClipConf::default().with_duration(5.0));
    let b = add(&mut t, spine, ClipKind::Image, "b", ClipConf::default());

    t.annotate_structure();
    // `b` fell back to 3s because the spine had no duration yet.
    assert_eq!(t.duration(spine), 8.0);
    t.set_root_duration(8.0);
    t.annotate_structure();
    assert_eq!(t.end_time(b), 8.0);
    assert_eq!(t.duration(spine), 8.0);
}
