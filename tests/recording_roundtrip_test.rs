//! Recording decode/encode laws: byte identity through an accept-all
//! filter, wire self-length, offset monotonicity, multi-file ordering.

mod common;

use bson::doc;
use tempfile::TempDir;

use common::{build_frame, build_op_msg, write_recording};
use mongotap::filter::{self, FilterConfig};
use mongotap::recording::{open_source, Packet, RecordingReader, RecordingSet, RecordingWriter};

/// A realistic little capture: session start, a few commands, responses,
/// session end, across two sessions.
fn sample_frames() -> Vec<Vec<u8>> {
    let meta_a: &[u8] = br#"{ remote: "127.0.0.1:51807", local: "127.0.0.1:27017" }"#;
    let meta_b: &[u8] = br#"{ remote: "127.0.0.1:51913", local: "127.0.0.1:27017" }"#;
    vec![
        build_frame(11, meta_a, 0, 1, &[]),
        build_frame(
            11,
            meta_a,
            120,
            2,
            &build_op_msg(1, 0, &doc! { "hello": 1, "$db": "admin" }),
        ),
        build_frame(
            11,
            meta_a,
            450,
            3,
            &build_op_msg(2, 1, &doc! { "ok": 1, "isWritablePrimary": true }),
        ),
        build_frame(12, meta_b, 600, 4, &[]),
        build_frame(
            12,
            meta_b,
            980,
            5,
            &build_op_msg(
                3,
                0,
                &doc! { "insert": "users", "$db": "app", "documents": [{ "_id": 1, "name": "A" }] },
            ),
        ),
        build_frame(
            12,
            meta_b,
            1400,
            6,
            &build_op_msg(4, 3, &doc! { "ok": 1, "n": 1 }),
        ),
        build_frame(12, meta_b, 2100, 7, &[]),
        build_frame(11, meta_a, 2500, 8, &[]),
    ]
}

#[test]
fn accept_all_filter_preserves_bytes_exactly() {
    let frames = sample_frames();
    let input: Vec<u8> = frames.concat();

    let dir = TempDir::new().unwrap();
    let path = write_recording(dir.path(), "capture.bin", &frames);

    let source = RecordingReader::open(&path).unwrap();
    let mut output = Vec::new();
    let mut writer = RecordingWriter::new(&mut output);
    let stats = filter::run(source, &mut writer, &FilterConfig::default()).unwrap();

    assert_eq!(stats.input_packets, frames.len() as u64);
    assert_eq!(stats.output_packets, frames.len() as u64);
    assert_eq!(output, input);
}

#[test]
fn wire_messages_carry_their_own_length() {
    let dir = TempDir::new().unwrap();
    let path = write_recording(dir.path(), "capture.bin", &sample_frames());

    for packet in RecordingReader::open(&path).unwrap() {
        let packet = packet.unwrap();
        if packet.message.is_empty() {
            continue;
        }
        let message = packet.message.as_ref();
        let declared =
            u32::from_le_bytes([message[0], message[1], message[2], message[3]]) as usize;
        assert_eq!(declared, message.len());
    }
}

#[test]
fn offsets_nondecreasing_and_orders_increasing() {
    let dir = TempDir::new().unwrap();
    let path = write_recording(dir.path(), "capture.bin", &sample_frames());

    let packets: Vec<Packet> = RecordingReader::open(&path)
        .unwrap()
        .map(|p| p.unwrap())
        .collect();

    for pair in packets.windows(2) {
        assert!(pair[0].offset_us <= pair[1].offset_us);
        assert!(pair[0].order < pair[1].order);
    }
}

#[test]
fn recording_set_concatenates_files_lexicographically() {
    let dir = TempDir::new().unwrap();
    // names mimic the server's creation-time-millis naming; lexicographic
    // order is chronological
    write_recording(
        dir.path(),
        "1700000001000.bin",
        &[
            build_frame(1, b"{}", 10, 1, &[]),
            build_frame(1, b"{}", 20, 2, &[]),
        ],
    );
    write_recording(
        dir.path(),
        "1700000002000.bin",
        &[build_frame(1, b"{}", 30, 3, &[])],
    );

    let set = RecordingSet::open(dir.path()).unwrap();
    let orders: Vec<u64> = set.map(|p| p.unwrap().order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
}

#[test]
fn open_source_handles_file_and_directory() {
    let dir = TempDir::new().unwrap();
    let path = write_recording(
        dir.path(),
        "1700000001000.bin",
        &[build_frame(1, b"{}", 10, 1, &[])],
    );

    assert_eq!(open_source(&path).unwrap().count(), 1);
    assert_eq!(open_source(dir.path()).unwrap().count(), 1);
}

#[test]
fn double_filter_is_stable() {
    // filtering an already-filtered recording changes nothing
    let frames = sample_frames();
    let dir = TempDir::new().unwrap();
    let path = write_recording(dir.path(), "capture.bin", &frames);

    let config = FilterConfig {
        requests_only: true,
        ..Default::default()
    };

    let mut first = Vec::new();
    filter::run(
        RecordingReader::open(&path).unwrap(),
        &mut RecordingWriter::new(&mut first),
        &config,
    )
    .unwrap();

    let filtered_path = dir.path().join("filtered.bin");
    std::fs::write(&filtered_path, &first).unwrap();

    let mut second = Vec::new();
    filter::run(
        RecordingReader::open(&filtered_path).unwrap(),
        &mut RecordingWriter::new(&mut second),
        &config,
    )
    .unwrap();

    assert_eq!(first, second);
}
