//! Benchmarks for the BSON codec and wire framing

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mongowire::bson::{BsonDocument, DocumentBuilder};
use mongowire::wire::{encode_message, Message};

fn sample_document() -> BsonDocument {
    let mut builder = DocumentBuilder::new();
    builder.append_double("balance", 1024.5).unwrap();
    builder.append_string("name", "benchmark-document").unwrap();
    builder.append_int64("counter", 1 << 40).unwrap();
    builder.append_bool("active", true).unwrap();
    builder
        .append_binary("blob", 0, &[0xabu8; 256])
        .unwrap();
    builder.finish().unwrap()
}

fn codec_benchmarks(c: &mut Criterion) {
    c.bench_function("bson_build", |b| {
        b.iter(|| black_box(sample_document()))
    });

    let doc = sample_document();
    c.bench_function("bson_get_field", |b| {
        b.iter(|| black_box(doc.get_int64("counter").unwrap()))
    });

    c.bench_function("frame_encode_query", |b| {
        let query = sample_document();
        b.iter(|| {
            let message = Message::query("bench.coll", 0, 0, 10, query.clone(), None);
            black_box(encode_message(&message, 1, 48 * 1024 * 1024).unwrap())
        })
    });
}

criterion_group!(benches, codec_benchmarks);
criterion_main!(benches);
