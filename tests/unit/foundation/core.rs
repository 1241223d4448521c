use super::*;

struct Plain;
#[allow(dead_code)]
struct Wrapper<T>(T);

#[test]
fn kind_identity_follows_type_not_name() {
    assert_eq!(ReprKind::of::<Plain>(), ReprKind::of::<Plain>());
    assert_ne!(ReprKind::of::<Wrapper<u8>>(), ReprKind::of::<Wrapper<f32>>());
}

#[test]
fn short_name_strips_module_paths() {
    assert_eq!(ReprKind::of::<Plain>().short_name(), "Plain");
    assert_eq!(ReprKind::of::<Wrapper<u8>>().short_name(), "Wrapper<u8>");
    assert_eq!(
        ReprKind::of::<Wrapper<std::string::String>>().short_name(),
        "Wrapper<String>"
    );
}

#[test]
fn priorities_rank_backends() {
    assert!(Priority::TEXTURE > Priority::COMPUTE);
    assert!(Priority::COMPUTE > Priority::RAM);
    assert!(Priority::RAM > Priority::DISK);
}

#[test]
fn le_bytes_decode_what_was_encoded() {
    let texels = [0.5f32, -1.25, 7.0];
    let bytes = samples_to_le_bytes(&texels);
    assert_eq!(bytes.len(), 12);
    assert_eq!(samples_from_le_bytes::<f32>(&bytes).unwrap(), texels);

    let wide = [1u16, 0xbeef];
    assert_eq!(
        samples_from_le_bytes::<u16>(&samples_to_le_bytes(&wide)).unwrap(),
        wide
    );
}

#[test]
fn ragged_byte_length_is_unsupported() {
    let err = samples_from_le_bytes::<f32>(&[0, 1, 2]).unwrap_err();
    assert!(matches!(err, ReprError::UnsupportedFormat(_)));
}
