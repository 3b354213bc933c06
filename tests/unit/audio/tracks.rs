use super::*;
use crate::clip::{ClipConf, ClipNode};
use crate::foundation::core::Canvas;

fn node(kind: ClipKind, id: &str, conf: ClipConf) -> ClipNode {
    ClipNode::new(kind, id).with_conf(conf)
}

fn scene() -> ClipTree {
    let mut t = ClipTree::new(Canvas {
        width: 16,
        height: 16,
    });
    t.set_root_duration(10.0);
    let root = t.root();

    let seq = t
        .add_child(root, node(ClipKind::Group, "seq", ClipConf::default().with_duration(10.0)))
        .unwrap();
    let v1 = t
        .add_child(seq, node(ClipKind::Video, "v1", ClipConf::default().with_duration(4.0)))
        .unwrap();
    t.add_child(seq, node(ClipKind::Transition, "tr", ClipConf::default().with_duration(2.0)))
        .unwrap();
    let v2 = t
        .add_child(seq, node(ClipKind::Video, "v2", ClipConf::default().with_duration(3.0)))
        .unwrap();

    let extracted = |src: &str| ClipConf::default().with_src(src).with_end("100%");
    t.add_child(v1, node(ClipKind::Audio, "v1_audio", extracted("/cache/v1.m4a")))
        .unwrap();
    let mut quiet = extracted("/cache/v2.m4a");
    quiet.volume = Some(0.5);
    t.add_child(v2, node(ClipKind::Audio, "v2_audio", quiet))
        .unwrap();

    let mut bgm = ClipConf::default().with_src("music.mp3").with_loop(true);
    bgm.fade_in = Some(1.0);
    t.add_child(root, node(ClipKind::Audio, "bgm", bgm)).unwrap();
    t.add_child(
        root,
        node(ClipKind::Audio, "muted", ClipConf::default().with_src("m.mp3")).with_active(false),
    )
    .unwrap();
    t.add_child(root, node(ClipKind::Audio, "nosrc", ClipConf::default().with_duration(1.0)))
        .unwrap();

    let short = t
        .add_child(
            root,
            node(ClipKind::Group, "short", ClipConf::default().with_start(0.0).with_end(2.0)),
        )
        .unwrap();
    t.add_child(
        short,
        node(ClipKind::Audio, "clip", ClipConf::default().with_src("x.mp3").with_duration(5.0)),
    )
    .unwrap();

    t.assign_z_indices();
    t.annotate_all();
    t
}

fn by_id<'a>(tracks: &'a [AudioTrack], id: &str) -> &'a AudioTrack {
    tracks.iter().find(|t| t.id == id).unwrap()
}

#[test]
fn collects_active_audio_in_tree_order() {
    let tracks = collect_audio_tracks(&scene(), Path::new("/assets")).unwrap();
    let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["bgm", "v1_audio", "v2_audio", "clip"]);
}

#[test]
fn transition_hands_audio_over_at_its_centre() {
    let tracks = collect_audio_tracks(&scene(), Path::new("/assets")).unwrap();
    let a = by_id(&tracks, "v1_audio");
    let b = by_id(&tracks, "v2_audio");
    assert_eq!((a.start, a.end), (0.0, 4.0));
    assert_eq!((b.start, b.end), (4.0, 7.0));
    assert_eq!(b.volume, 0.5);
    assert_eq!(b.path, PathBuf::from("/cache/v2.m4a"));
}

#[test]
fn background_track_keeps_its_settings() {
    let tracks = collect_audio_tracks(&scene(), Path::new("/assets")).unwrap();
    let bgm = by_id(&tracks, "bgm");
    assert!(bgm.looping);
    assert_eq!((bgm.start, bgm.end), (0.0, 10.0));
    assert_eq!(bgm.fade_in, 1.0);
    assert_eq!(bgm.volume, 1.0);
    assert_eq!(bgm.speed, 1.0);
    assert_eq!(bgm.path, PathBuf::from("/assets/music.mp3"));
}

#[test]
fn ancestor_window_clips_the_track() {
    let tracks = collect_audio_tracks(&scene(), Path::new("/assets")).unwrap();
    let clip = by_id(&tracks, "clip");
    assert_eq!((clip.start, clip.end), (0.0, 2.0));
    assert_eq!(clip.duration(), 2.0);
    assert_eq!(clip.ss, 0.0);
}
