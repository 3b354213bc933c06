use super::*;
use crate::clip::{ClipConf, ClipNode};
use crate::foundation::core::Canvas;

fn fps30() -> Fps {
    Fps::new(30, 1).unwrap()
}

fn empty_tree() -> ClipTree {
    ClipTree::new(Canvas {
        width: 640,
        height: 360,
    })
}

fn add(t: &mut ClipTree, parent: ClipId, kind: ClipKind, id: &str, conf: ClipConf) -> ClipId {
    t.add_child(parent, ClipNode::new(kind, id).with_conf(conf))
        .unwrap()
}

fn spine_tree() -> (ClipTree, ClipId) {
    let mut t = empty_tree();
    let root = t.root();
    let spine = add(&mut t, root, ClipKind::Spine, "spine", ClipConf::default());
    (t, spine)
}

#[test]
fn duration_comes_from_spine() {
    let (mut t, spine) = spine_tree();
    add(&mut t, spine, ClipKind::Image, "a", ClipConf::default().with_duration(5.0));
    let b = add(&mut t, spine, ClipKind::Image, "b", ClipConf::default());

    let mut tl = Timeline::new(fps30());
    let report = tl.annotate(&mut t);
    assert_eq!(report.duration, 8.0);
    assert!(report.changed);
    assert_eq!(report.passes, 2);
    assert!(report.converged);
    assert_eq!(tl.frames_num(), 240);
    assert_eq!(t.node(b).timing().unwrap().abs_end, 8.0);
}

#[test]
fn second_annotate_reports_no_change() {
    let (mut t, spine) = spine_tree();
    add(&mut t, spine, ClipKind::Text, "a", ClipConf::default().with_duration(2.5));
    let mut tl = Timeline::new(fps30());
    assert!(tl.annotate(&mut t).changed);

    let snapshot: Vec<_> = t
        .all_nodes(t.root())
        .into_iter()
        .map(|id| *t.node(id).timing().unwrap())
        .collect();
    let again = tl.annotate(&mut t);
    assert!(!again.changed);
    assert_eq!(again.duration, 2.5);
    let after: Vec<_> = t
        .all_nodes(t.root())
        .into_iter()
        .map(|id| *t.node(id).timing().unwrap())
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn non_looping_video_extends_past_spine() {
    let (mut t, spine) = spine_tree();
    let g = add(&mut t, spine, ClipKind::Group, "g", ClipConf::default().with_duration(2.0));
    let v = add(&mut t, g, ClipKind::Video, "v", ClipConf::default());
    t.set_media_length(v, Some(6.0));

    let mut tl = Timeline::new(fps30());
    let report = tl.annotate(&mut t);
    assert_eq!(report.duration, 6.0);
}

#[test]
fn looping_video_only_extends_with_explicit_timing() {
    let (mut t, spine) = spine_tree();
    let g = add(&mut t, spine, ClipKind::Group, "g", ClipConf::default().with_duration(2.0));
    let implicit = add(
        &mut t,
        g,
        ClipKind::Video,
        "implicit",
        ClipConf::default().with_loop(true),
    );
    assert!(!Timeline::extends(&t, implicit));

    let explicit = add(
        &mut t,
        g,
        ClipKind::Video,
        "explicit",
        ClipConf::default().with_loop(true).with_start(0.0).with_end(9.0),
    );
    assert!(Timeline::extends(&t, explicit));

    let mut tl = Timeline::new(fps30());
    assert_eq!(tl.annotate(&mut t).duration, 9.0);
}

fn slow_settling_tree() -> ClipTree {
    let (mut t, spine) = spine_tree();
    let root = t.root();
    add(&mut t, spine, ClipKind::Image, "a", ClipConf::default().with_duration(4.0));
    let g = add(
        &mut t,
        root,
        ClipKind::Group,
        "g",
        ClipConf::default().with_start(0.0).with_duration("100%"),
    );
    add(
        &mut t,
        g,
        ClipKind::Video,
        "v",
        ClipConf::default()
            .with_loop(true)
            .with_start(0.0)
            .with_end("50%+4"),
    );
    t
}

#[test]
fn two_pass_reports_unsettled_duration() {
    let mut t = slow_settling_tree();
    let mut tl = Timeline::new(fps30());
    let report = tl.annotate(&mut t);
    assert_eq!(report.passes, 2);
    assert!(!report.converged);
    assert_eq!(report.duration, 4.0);
}

#[test]
fn converge_mode_settles() {
    let mut t = slow_settling_tree();
    let mut tl = Timeline::new(fps30()).with_mode(AnnotateMode::Converge { max_passes: 64 });
    let report = tl.annotate(&mut t);
    assert!(report.converged);
    assert!(report.passes > 2);
    assert!((report.duration - 8.0).abs() < 0.01, "{report:?}");
}

#[test]
fn clock_moves_by_frames_and_seeks() {
    let (mut t, spine) = spine_tree();
    add(&mut t, spine, ClipKind::Image, "a", ClipConf::default().with_duration(2.0));
    let mut tl = Timeline::new(Fps::new(25, 1).unwrap());
    tl.annotate(&mut t);

    assert_eq!(tl.total_ms(), 2000.0);
    tl.next_frame();
    tl.next_frame();
    assert_eq!(tl.current_ms(), 80.0);
    assert_eq!(tl.frame_time(FrameIndex(50)), 2.0);

    tl.jump_to(5000.0);
    assert_eq!(tl.current_ms(), 2000.0);
    assert!(tl.is_over());

    tl.jump_to(-3.0);
    assert_eq!(tl.current_ms(), 0.0);
    tl.advance(120.0);
    assert_eq!(tl.current_ms(), 120.0);
    tl.next_frame();
    assert_eq!(tl.current_ms(), 160.0);
    tl.rewind();
    assert_eq!(tl.current_ms(), 0.0);
}

#[test]
fn advance_stops_at_the_last_millisecond() {
    let (mut t, spine) = spine_tree();
    add(&mut t, spine, ClipKind::Image, "a", ClipConf::default().with_duration(0.99));
    let mut tl = Timeline::new(Fps::new(25, 1).unwrap());
    tl.annotate(&mut t);

    assert_eq!(tl.total_ms(), 990.0);
    tl.jump_to(960.0);
    tl.advance(40.0);
    assert_eq!(tl.current_ms(), 990.0);
    assert!(tl.is_over());
}

#[test]
fn long_sibling_chains_resolve_in_one_sweep() {
    let (mut t, spine) = spine_tree();
    let n = 3000;
    let ids: Vec<ClipId> = (0..n)
        .map(|i| {
            add(
                &mut t,
                spine,
                ClipKind::Image,
                &format!("img{i}"),
                ClipConf::default().with_duration(1.0),
            )
        })
        .collect();

    let mut tl = Timeline::new(fps30());
    let report = tl.annotate(&mut t);
    assert_eq!(report.duration, n as f64);

    let last = t.node(ids[n - 1]).timing().unwrap();
    assert_eq!(last.abs_start, (n - 1) as f64);
    assert_eq!(last.abs_end, n as f64);
    assert_eq!(t.prev_sibling(ids[n - 1]), Some(ids[n - 2]));
}
