use super::*;

#[test]
fn flatten_premul_over_black_produces_expected_rgb() {
    // Premultiplied red @ 50% alpha => rgb is 128,0,0 when premul.
    let src = vec![128u8, 0u8, 0u8, 128u8];
    let mut dst = vec![0u8; 4];
    flatten_to_opaque_rgba8(&mut dst, &src, true, [0, 0, 0, 255]).unwrap();
    assert_eq!(dst, vec![128u8, 0u8, 0u8, 255u8]);
}

#[test]
fn flatten_straight_alpha_0_returns_bg() {
    let src = vec![200u8, 100, 50, 0];
    let mut dst = vec![0u8; 4];
    flatten_to_opaque_rgba8(&mut dst, &src, false, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_to_opaque_rgba8(&mut dst, &[0u8; 4], false, [0, 0, 0, 255]).is_err());
}

#[test]
fn filled_frame_has_expected_size() {
    let f = FrameBuffer::filled(3, 2, [1, 2, 3, 255]);
    assert_eq!(f.data.len(), 24);
    assert_eq!(&f.data[20..], &[1, 2, 3, 255]);
    f.validate().unwrap();

    let bad = FrameBuffer {
        data: vec![0; 5],
        ..f
    };
    assert!(bad.validate().is_err());
}

#[test]
fn raw_payload_is_opaque_rgba() {
    let frame = FrameBuffer::filled(2, 2, [255, 0, 0, 0]);
    let p = encode_payload(FrameIndex(7), &frame, CacheFormat::Raw, 80, [0, 0, 255, 255]).unwrap();
    assert_eq!(p.index, FrameIndex(7));
    assert_eq!(p.bytes.len(), 16);
    assert!(p.bytes.chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
}

#[test]
fn png_payload_decodes_back() {
    let frame = FrameBuffer::filled(4, 3, [12, 34, 56, 255]);
    let p = encode_payload(FrameIndex(0), &frame, CacheFormat::Png, 80, [0, 0, 0, 255]).unwrap();
    let img = image::load_from_memory(&p.bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (4, 3));
    assert_eq!(img.get_pixel(3, 2).0, [12, 34, 56, 255]);
}

#[test]
fn jpeg_payload_has_jpeg_magic() {
    let frame = FrameBuffer::filled(8, 8, [200, 200, 200, 255]);
    let p = encode_payload(FrameIndex(0), &frame, CacheFormat::Jpg, 90, [0, 0, 0, 255]).unwrap();
    assert_eq!(&p.bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(p.format, CacheFormat::Jpg);
}
