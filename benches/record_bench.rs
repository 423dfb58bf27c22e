//! Benchmarks for onirec record coding, recording and playback

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use onirec::format::{HeaderWidth, Property, PropertyValue, Record, RecordBody};
use onirec::{CodecId, CodecRegistry, Config, NodeNotifications, NodeType, OniReader, OniWriter, SeekOrigin};

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const FRAMES: u32 = 60;

struct Discard;

impl NodeNotifications for Discard {}

fn record_recording(frames: u32) -> Vec<u8> {
    let mut writer =
        OniWriter::open(Cursor::new(Vec::new()), Config::default(), CodecRegistry::new()).unwrap();
    writer.on_node_added("Depth1", NodeType::Depth, CodecId::UNCOMPRESSED).unwrap();
    writer.on_node_int_prop_changed("Depth1", "xnMirror", 0).unwrap();
    writer.on_node_state_ready("Depth1").unwrap();

    let frame = vec![0x5au8; WIDTH * HEIGHT * 2];
    for n in 1..=frames {
        writer
            .on_node_new_data("Depth1", u64::from(n) * 33_333, n, &frame)
            .unwrap();
        if n % 10 == 0 {
            writer.on_node_int_prop_changed("Depth1", "xnMirror", u64::from(n / 10 % 2)).unwrap();
        }
    }
    writer.close().unwrap().into_inner()
}

fn codec_benchmarks(c: &mut Criterion) {
    let record = Record::new(
        1,
        RecordBody::Property(Property::new(
            "xnMapOutputMode",
            PropertyValue::General(vec![0u8; 12].into()),
        )),
    )
    .with_undo(4096);
    let mut buf = vec![0u8; 256];

    c.bench_function("record_encode", |b| {
        b.iter(|| record.encode(HeaderWidth::Current64, black_box(&mut buf)).unwrap())
    });

    let size = record.encode(HeaderWidth::Current64, &mut buf).unwrap();
    c.bench_function("record_decode", |b| {
        b.iter(|| Record::decode(black_box(&buf[..size]), HeaderWidth::Current64).unwrap())
    });
}

fn playback_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback");
    group.throughput(Throughput::Bytes((WIDTH * HEIGHT * 2) as u64 * u64::from(FRAMES)));

    group.bench_function("record", |b| b.iter(|| record_recording(FRAMES)));

    let file = record_recording(FRAMES);
    group.bench_function("replay", |b| {
        b.iter_batched(
            || Cursor::new(file.clone()),
            |stream| {
                let mut reader =
                    OniReader::open(stream, Discard, Config::default(), CodecRegistry::new()).unwrap();
                while !reader.is_eof() {
                    reader.read_next().unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    for (name, fast_seek) in [("seek_fast", true), ("seek_slow", false)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let config = Config::builder().fast_seek(fast_seek).build();
                    let mut reader =
                        OniReader::open(Cursor::new(file.clone()), Discard, config, CodecRegistry::new())
                            .unwrap();
                    reader.seek_to_frame("Depth1", -1, SeekOrigin::End).unwrap();
                    reader
                },
                |mut reader| reader.seek_to_frame("Depth1", 55, SeekOrigin::Set).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, codec_benchmarks, playback_benchmarks);
criterion_main!(benches);
