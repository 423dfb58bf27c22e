//! Tests for the record codec
//!
//! These tests verify:
//! - Encode/decode of every record variant
//! - Capacity-bounded encoding
//! - Header validation (magic, fields size)
//! - Older NodeAdded shapes lifted to the newest layout
//! - Zero-copy string decoding
//! - Seek index encoding in both widths

use std::borrow::Cow;

use onirec::format::{
    decode_index, encode_index, NodeAdded, NodeAddedShape, Property, PropertyValue, Record,
    RecordBody, RecordHeader, RecordType, SeekIndexEntry, SeekInfo, HeaderWidth, RECORD_MAGIC,
};
use onirec::{CodecId, NodeType, OniError};

// =============================================================================
// Helper Functions
// =============================================================================

fn encode(record: &Record<'_>, width: HeaderWidth) -> Vec<u8> {
    let mut buf = vec![0u8; 512];
    let size = record.encode(width, &mut buf).unwrap();
    buf.truncate(size);
    buf
}

fn roundtrip(record: Record<'_>, width: HeaderWidth) {
    let bytes = encode(&record, width);
    let decoded = Record::decode(&bytes, width).unwrap();
    assert_eq!(decoded, record);
}

fn node_added() -> NodeAdded<'static> {
    let mut added = NodeAdded::new("Depth1", NodeType::Depth, CodecId::Z16);
    added.frames = 300;
    added.min_timestamp = 33;
    added.max_timestamp = 9_966_000;
    added.seek_table_pos = 0x1_0000_0000;
    added
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_roundtrip_every_variant() {
    let records = vec![
        Record::new(1, RecordBody::NodeAdded(node_added())),
        Record::new(1, RecordBody::NodeRemoved).with_undo(28),
        Record::new(2, RecordBody::Property(Property::new("xnMirror", PropertyValue::Int(1)))).with_undo(100),
        Record::new(2, RecordBody::Property(Property::new("xnZoom", PropertyValue::Real(1.5)))),
        Record::new(
            2,
            RecordBody::Property(Property::new("xnFormat", PropertyValue::String(Cow::Borrowed("RGB24")))),
        ),
        Record::new(
            2,
            RecordBody::Property(Property::new("xnMode", PropertyValue::General(Cow::Owned(vec![1, 2, 3])))),
        ),
        Record::new(1, RecordBody::NodeDataBegin(SeekInfo { frames: 10, max_timestamp: 9000 })),
        Record::new(1, RecordBody::NodeStateReady),
        Record::new(1, RecordBody::NewData { timestamp: 5000, frame: 6 })
            .with_undo(4096)
            .with_payload_size(614_400),
        Record::new(1, RecordBody::SeekTable).with_payload_size(220),
        Record::new(u32::MAX, RecordBody::End),
    ];

    for record in records {
        roundtrip(record, HeaderWidth::Current64);
    }
}

#[test]
fn test_roundtrip_legacy_width() {
    let mut added = node_added();
    added.seek_table_pos = 4096;
    roundtrip(Record::new(1, RecordBody::NodeAdded(added)), HeaderWidth::Legacy32);
    roundtrip(
        Record::new(1, RecordBody::NewData { timestamp: 1, frame: 1 }).with_undo(77),
        HeaderWidth::Legacy32,
    );
}

#[test]
fn test_new_data_fields_layout() {
    let record = Record::new(3, RecordBody::NewData { timestamp: 0x0102_0304, frame: 7 })
        .with_undo(0xAABB)
        .with_payload_size(16);
    let bytes = encode(&record, HeaderWidth::Current64);

    assert_eq!(bytes.len(), 28 + 8 + 4);
    assert_eq!(&bytes[0..4], b"NIR\0");
    assert_eq!(&bytes[4..8], &0x0Au32.to_le_bytes());
    assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
    assert_eq!(&bytes[12..16], &40u32.to_le_bytes());
    assert_eq!(&bytes[16..20], &16u32.to_le_bytes());
    assert_eq!(&bytes[20..28], &0xAABBu64.to_le_bytes());
    assert_eq!(&bytes[28..36], &0x0102_0304u64.to_le_bytes());
    assert_eq!(&bytes[36..40], &7u32.to_le_bytes());
}

#[test]
fn test_string_property_stores_terminator() {
    let record = Record::new(
        1,
        RecordBody::Property(Property::new("f", PropertyValue::String(Cow::Borrowed("ab")))),
    );
    let bytes = encode(&record, HeaderWidth::Current64);

    // name: len 2, "f\0"; value size 3, "ab\0"
    assert_eq!(&bytes[28..], &[2, 0, 0, 0, b'f', 0, 3, 0, 0, 0, b'a', b'b', 0]);
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_encode_never_writes_past_capacity() {
    let record = Record::new(
        1,
        RecordBody::Property(Property::new("blob", PropertyValue::General(Cow::Owned(vec![7u8; 64])))),
    );

    let mut buf = vec![0xEEu8; 128];
    let err = record.encode(HeaderWidth::Current64, &mut buf[..60]).unwrap_err();
    assert!(matches!(err, OniError::BufferTooSmall { capacity: 60, .. }));
    assert!(buf[60..].iter().all(|b| *b == 0xEE));
}

#[test]
fn test_encode_fits_exactly() {
    let record = Record::new(1, RecordBody::NodeStateReady);
    let mut buf = [0u8; 28];
    assert_eq!(record.encode(HeaderWidth::Current64, &mut buf).unwrap(), 28);

    let mut small = [0u8; 27];
    assert!(matches!(
        record.encode(HeaderWidth::Current64, &mut small),
        Err(OniError::BufferTooSmall { .. })
    ));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_bad_record_magic_is_corrupt_header() {
    let mut bytes = encode(&Record::new(1, RecordBody::NodeStateReady), HeaderWidth::Current64);
    bytes[0] ^= 0xFF;
    assert!(matches!(
        Record::decode(&bytes, HeaderWidth::Current64),
        Err(OniError::CorruptHeader(_))
    ));
}

#[test]
fn test_short_header_is_corrupt_header() {
    let bytes = RECORD_MAGIC.to_le_bytes();
    assert!(matches!(
        RecordHeader::decode(&bytes, HeaderWidth::Current64),
        Err(OniError::CorruptHeader(_))
    ));
}

#[test]
fn test_unknown_record_type_is_corrupt() {
    let mut bytes = encode(&Record::new(1, RecordBody::NodeStateReady), HeaderWidth::Current64);
    bytes[4..8].copy_from_slice(&0x42u32.to_le_bytes());
    let err = Record::decode(&bytes, HeaderWidth::Current64).unwrap_err();
    assert!(matches!(err, OniError::CorruptFile(_)));
    assert!(err.is_corruption());
}

#[test]
fn test_fields_beyond_input_are_corrupt() {
    let bytes = encode(&Record::new(1, RecordBody::NodeAdded(node_added())), HeaderWidth::Current64);
    let err = Record::decode(&bytes[..bytes.len() - 1], HeaderWidth::Current64).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_wrong_sized_int_property_is_corrupt() {
    let record = Record::new(
        1,
        RecordBody::Property(Property::new("x", PropertyValue::General(Cow::Owned(vec![1, 2, 3, 4])))),
    );
    let mut bytes = encode(&record, HeaderWidth::Current64);
    bytes[4..8].copy_from_slice(&(RecordType::IntProperty as u32).to_le_bytes());
    assert!(matches!(
        Record::decode(&bytes, HeaderWidth::Current64),
        Err(OniError::CorruptFile(_))
    ));
}

#[test]
fn test_width_must_match_file() {
    let bytes = encode(
        &Record::new(1, RecordBody::NewData { timestamp: 9, frame: 1 }),
        HeaderWidth::Current64,
    );
    let decoded = Record::decode(&bytes, HeaderWidth::Legacy32);
    assert!(!matches!(decoded, Ok(Record { body: RecordBody::NewData { timestamp: 9, frame: 1 }, .. })));
}

// =============================================================================
// NodeAdded Shape Tests
// =============================================================================

#[test]
fn test_v1_node_added_lifts_with_zero_stats() {
    let mut v1 = NodeAdded::new("Image1", NodeType::Image, CodecId::JPEG);
    v1.shape = NodeAddedShape::V1;
    let bytes = encode(&Record::new(4, RecordBody::NodeAdded(v1)), HeaderWidth::Legacy32);
    assert_eq!(&bytes[4..8], &(RecordType::NodeAddedV1 as u32).to_le_bytes());

    let decoded = Record::decode(&bytes, HeaderWidth::Legacy32).unwrap();
    match decoded.body {
        RecordBody::NodeAdded(added) => {
            assert_eq!(added.shape, NodeAddedShape::V1);
            assert_eq!(added.name, "Image1");
            assert_eq!(added.codec, CodecId::JPEG);
            assert_eq!(added.frames, 0);
            assert_eq!(added.seek_table_pos, 0);
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_v2_node_added_keeps_stats() {
    let mut v2 = node_added();
    v2.shape = NodeAddedShape::V2;
    let bytes = encode(&Record::new(1, RecordBody::NodeAdded(v2)), HeaderWidth::Current64);

    match Record::decode(&bytes, HeaderWidth::Current64).unwrap().body {
        RecordBody::NodeAdded(added) => {
            assert_eq!(added.frames, 300);
            assert_eq!(added.max_timestamp, 9_966_000);
            assert_eq!(added.seek_table_pos, 0);
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_decode_borrows_from_input() {
    let bytes = encode(&Record::new(1, RecordBody::NodeAdded(node_added())), HeaderWidth::Current64);
    let decoded = Record::decode(&bytes, HeaderWidth::Current64).unwrap();
    match &decoded.body {
        RecordBody::NodeAdded(added) => assert!(matches!(added.name, Cow::Borrowed("Depth1"))),
        other => panic!("unexpected body {:?}", other),
    }

    let owned = decoded.clone().into_owned();
    assert_eq!(owned, decoded);
}

// =============================================================================
// Seek Index Tests
// =============================================================================

#[test]
fn test_index_has_zero_entry_and_both_widths() {
    let entries = vec![
        SeekIndexEntry { timestamp: 0, config_id: 3, seek_pos: 200 },
        SeekIndexEntry { timestamp: 33_000, config_id: 3, seek_pos: 800 },
    ];

    let current = encode_index(&entries, HeaderWidth::Current64).unwrap();
    assert_eq!(current.len(), 3 * 20);
    assert!(current[..20].iter().all(|b| *b == 0));
    let decoded = decode_index(&current, 2, HeaderWidth::Current64).unwrap();
    assert_eq!(decoded[0], SeekIndexEntry::default());
    assert_eq!(&decoded[1..], &entries[..]);

    let legacy = encode_index(&entries, HeaderWidth::Legacy32).unwrap();
    assert_eq!(legacy.len(), 3 * 16);
    assert_eq!(&legacy[16 + 12..16 + 16], &200u32.to_le_bytes());
    assert_eq!(&decode_index(&legacy, 2, HeaderWidth::Legacy32).unwrap()[1..], &entries[..]);
}

#[test]
fn test_display_is_one_line() {
    let record = Record::new(1, RecordBody::NodeAdded(node_added()));
    let text = record.to_string();
    assert!(text.starts_with("NodeAddedV3 node=1"));
    assert!(text.contains("name='Depth1'"));
    assert!(!text.contains('\n'));
}
