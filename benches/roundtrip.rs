//! Benchmark: decode, encode and decode+encode of a synthetic PNG with many
//! IDAT chunks. The description is the chunk loop used by the png test.

use binaryfile::{decode_bytes, encode_to_vec, Record, Result, Section};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const CHUNKS: usize = 2_000;

fn ihdr(f: &mut dyn Section) -> Result<()> {
    f.uint("width", 4)?;
    f.uint("height", 4)?;
    f.packed("flags", ">BBBBB")?;
    Ok(())
}

fn chunk(f: &mut dyn Section) -> Result<()> {
    let length = f.uint("length", 4)?;
    let kind = f.bytes("type", 4)?;
    if kind == b"IHDR" {
        f.section("data", &mut ihdr)?;
    } else {
        f.bytes("data", length as usize)?;
    }
    f.uint("crc", 4)?;
    Ok(())
}

fn png(f: &mut dyn Section) -> Result<()> {
    f.bytes("header", 8)?;
    f.repeat("chunks", &mut chunk, &mut |c: &Record| {
        c.bytes("type") == Some(&b"IEND"[..])
    })?;
    Ok(())
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&0u32.to_be_bytes());
}

fn synthetic_png() -> Vec<u8> {
    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    push_chunk(&mut out, b"IHDR", &[0, 0, 1, 0, 0, 0, 1, 0, 8, 2, 0, 0, 0]);
    for i in 0..CHUNKS {
        let data: Vec<u8> = (0..(i % 97 + 16)).map(|b| b as u8).collect();
        push_chunk(&mut out, b"IDAT", &data);
    }
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn bench_roundtrip(c: &mut Criterion) {
    let input = synthetic_png();
    let record = decode_bytes(&input, png).expect("decode");
    eprintln!(
        "roundtrip: {} chunks, {} bytes (one warm-up pass)",
        record.list("chunks").map_or(0, |l| l.len()),
        input.len()
    );

    c.bench_function("decode_png", |b| {
        b.iter(|| decode_bytes(black_box(&input), png).expect("decode"))
    });

    c.bench_function("encode_png", |b| {
        b.iter(|| encode_to_vec(black_box(&record), png).expect("encode"))
    });

    c.bench_function("decode_encode_png", |b| {
        b.iter(|| {
            let r = decode_bytes(black_box(&input), png).expect("decode");
            black_box(encode_to_vec(&r, png).expect("encode"))
        })
    });
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
