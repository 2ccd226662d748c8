use anyhow::Context;
use binaryfile::dump::value_summary_line;
use binaryfile::{decode, dump_record, encode_to_vec, Record, Result, Section};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tracing::{info, warn};

fn png_ihdr(f: &mut dyn Section) -> Result<()> {
    f.uint("width", 4)?;
    f.uint("height", 4)?;
    f.uint("bit_depth", 1)?;
    f.uint("color_type", 1)?;
    f.uint("compression_method", 1)?;
    f.uint("filter_method", 1)?;
    f.uint("interlace_method", 1)?;
    Ok(())
}

fn png_chunk(f: &mut dyn Section) -> Result<()> {
    let length = f.uint("length", 4)?;
    let kind = f.bytes("type", 4)?;
    if kind == b"IHDR" {
        f.section("data", &mut png_ihdr)?;
    } else {
        f.bytes("data", length as usize)?;
    }
    f.uint("crc", 4)?;
    Ok(())
}

fn png(f: &mut dyn Section) -> Result<()> {
    f.bytes("header", 8)?;
    f.repeat("chunks", &mut png_chunk, &mut |c: &Record| {
        c.bytes("type") == Some(&b"IEND"[..])
    })?;
    f.remaining("trailer")?;
    Ok(())
}

fn usage() -> anyhow::Error {
    anyhow::anyhow!("usage: dump_png [--verbose|-v] [--summary] [--check] [--dump=<out>] <file.png>")
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let mut take_flag = |names: &[&str]| match raw_args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            raw_args.remove(pos);
            true
        }
        None => false,
    };
    let verbose = take_flag(&["--verbose", "-v"]);
    let summary = take_flag(&["--summary"]);
    let check = take_flag(&["--check"]);
    let dump_path: Option<PathBuf> = raw_args
        .iter()
        .position(|a| a.starts_with("--dump="))
        .and_then(|pos| raw_args.remove(pos).strip_prefix("--dump=").map(PathBuf::from));
    let png_path: PathBuf = raw_args.into_iter().next().map(PathBuf::from).ok_or_else(usage)?;

    let level = if verbose { tracing::Level::TRACE } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let file = File::open(&png_path).with_context(|| format!("open {}", png_path.display()))?;
    let record = decode(BufReader::new(file), png)
        .with_context(|| format!("decode {}", png_path.display()))?;

    let chunks = record.list("chunks").unwrap_or_default();
    info!(path = %png_path.display(), chunks = chunks.len(), "decoded");
    if record.bytes("trailer").map_or(false, |t| !t.is_empty()) {
        warn!("bytes after IEND kept as trailer");
    }

    let text = if summary {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let Some(c) = chunk.as_record() else { continue };
            let fields: Vec<String> = c
                .iter()
                .map(|(name, value)| format!("{}={}", name, value_summary_line(value)))
                .collect();
            out.push_str(&format!("[{}] {}\n", i, fields.join(" ")));
        }
        out
    } else {
        dump_record("png", &record)
    };

    match dump_path {
        Some(p) => File::create(&p)
            .and_then(|mut f| f.write_all(text.as_bytes()))
            .with_context(|| format!("write {}", p.display()))?,
        None => std::io::stdout().write_all(text.as_bytes())?,
    }

    if check {
        let original = std::fs::read(&png_path)?;
        let encoded = encode_to_vec(&record, png).context("re-encode")?;
        if encoded != original {
            let at = encoded
                .iter()
                .zip(&original)
                .position(|(a, b)| a != b)
                .unwrap_or(encoded.len().min(original.len()));
            anyhow::bail!("round trip differs at byte {}", at);
        }
        info!(bytes = encoded.len(), "round trip identical");
    }
    Ok(())
}
