//! InfluxDB line protocol encoding
//!
//! `measurement,tag=v,tag=v field=1.5,field=2 1700000000000`

use super::Point;

/// Encode a point as one line of line protocol (millisecond precision)
///
/// Tags are emitted sorted by key, which is what InfluxDB recommends for write
/// performance. Points without fields cannot be represented and yield `None`.
pub fn encode_point(point: &Point) -> Option<String> {
    if point.fields().is_empty() {
        return None;
    }

    let mut line = escape(point.measurement(), &[',', ' ']);

    let mut tags: Vec<&(String, String)> = point.tags().iter().collect();
    tags.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    line.push(' ');
    let fields: Vec<String> = point
        .fields()
        .iter()
        .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), format_float(*value)))
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&point.timestamp_ms().to_string());

    Some(line)
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn format_float(value: f64) -> String {
    // Display never uses exponent notation, which line protocol rejects for
    // very large values.
    format!("{value}")
}
