//! Format decoded records for display (indented text dump, one-line summaries).

use crate::record::Record;
use crate::value::Value;

/// Byte strings longer than this are elided in dumps.
const MAX_DUMP_BYTES: usize = 32;

/// Raw scalar string; `None` for compound values.
pub fn format_scalar_raw(v: &Value) -> Option<String> {
    Some(match v {
        Value::Bool(x) => format!("{}", x),
        Value::Int(x) => format!("{}", x),
        Value::UInt(x) => format!("{}", x),
        Value::Float(x) => format!("{}", x),
        Value::Bytes(b) => format_bytes(b),
        _ => return None,
    })
}

/// Printable ASCII as a quoted string, anything else as hex.
fn format_bytes(b: &[u8]) -> String {
    if !b.is_empty() && b.iter().all(|c| c.is_ascii_graphic() || *c == b' ') {
        return format!("{:?}", String::from_utf8_lossy(b));
    }
    if b.len() > MAX_DUMP_BYTES {
        format!("hex({} ...) [{} bytes]", hex_string(&b[..MAX_DUMP_BYTES]), b.len())
    } else {
        format!("hex({})", hex_string(b))
    }
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Multi-line dump of a record, fields in declaration order.
pub fn dump_record(name: &str, record: &Record) -> String {
    let mut out = format!("{} {}", name, record_to_dump(record, 0));
    out.push('\n');
    out
}

fn record_to_dump(record: &Record, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let mut lines: Vec<String> = vec!["{".to_string()];
    for (k, v) in record.iter() {
        lines.push(format!("{}  {}: {}", pad, k, value_to_dump(v, indent + 1)));
    }
    lines.push(format!("{}}}", pad));
    lines.join("\n")
}

/// Dump of one value; compound values span several lines indented by `indent`.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    if let Some(s) = format_scalar_raw(v) {
        return s;
    }
    let pad = "  ".repeat(indent);
    match v {
        Value::Record(r) => record_to_dump(r, indent),
        Value::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|i| value_to_dump(i, indent)).collect();
            format!("({})", parts.join(", "))
        }
        Value::List(items) if items.is_empty() => "[]".to_string(),
        Value::List(items) => {
            let mut lines: Vec<String> = vec!["[".to_string()];
            for (i, item) in items.iter().enumerate() {
                lines.push(format!("{}  [{}] {}", pad, i, value_to_dump(item, indent + 1)));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        _ => format!("{:?}", v),
    }
}

/// First line of [`value_to_dump`].
pub fn value_summary_line(v: &Value) -> String {
    let full = value_to_dump(v, 0);
    full.lines().next().map(|s| s.trim().to_string()).unwrap_or_default()
}
