use super::*;

#[test]
fn fps_rejects_zero() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn fps_conversions() {
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(fps.as_f64(), 30.0);
    assert!((fps.frame_duration_ms() - 33.333_333).abs() < 1e-3);
    assert_eq!(fps.frames_to_secs(60), 2.0);
}

#[test]
fn frames_to_cover_rounds_partial_frames_up() {
    let fps = Fps::new(25, 1).unwrap();
    assert_eq!(fps.frames_to_cover(2.0), 50);
    assert_eq!(fps.frames_to_cover(2.01), 51);
    assert_eq!(fps.frames_to_cover(0.0), 0);
    assert_eq!(fps.frames_to_cover(f64::NAN), 0);

    let ntsc = Fps::new(30000, 1001).unwrap();
    assert_eq!(ntsc.frames_to_cover(1.001), 30);
}

#[test]
fn round_ms_keeps_three_decimals() {
    assert_eq!(round_ms(1.23456), 1.235);
    assert_eq!(round_ms(0.1 + 0.2), 0.3);
}

#[test]
fn time_window_is_half_open() {
    let w = TimeWindow::new(1.0, 2.0);
    assert!(w.contains(1.0));
    assert!(w.contains(1.999));
    assert!(!w.contains(2.0));
    assert_eq!(w.len(), 1.0);
    assert!(TimeWindow::new(2.0, 2.0).is_empty());
}
