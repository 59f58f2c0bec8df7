//! InfluxDB line protocol rendering.

use crate::sink::{PointSink, SinkError};
use crate::types::point::Point;
use crate::types::station::FieldValue;
use std::io::Write;

/// Renders one point as a line, without the trailing newline.
///
/// Tags with an empty value and non-finite float fields cannot be expressed
/// in line protocol and are left out. Returns `None` if no field remains.
/// The timestamp is written in seconds, treating the reading time as UTC.
pub fn to_line(point: &Point) -> Option<String> {
    let fields: Vec<String> = point
        .fields
        .iter()
        .filter_map(|(key, value)| Some(format!("{}={}", escape_key(key), field_value(value)?)))
        .collect();
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }
    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&point.timestamp.and_utc().timestamp().to_string());
    Some(line)
}

/// Renders points as newline-terminated lines.
pub fn to_lines(points: &[Point]) -> String {
    let mut out = String::new();
    for line in points.iter().filter_map(to_line) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn field_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(f) if f.is_finite() => Some(f.to_string()),
        FieldValue::Float(_) => None,
        FieldValue::Integer(i) => Some(format!("{}i", i)),
        FieldValue::Boolean(b) => Some(b.to_string()),
        FieldValue::Text(s) => Some(format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"")
        )),
    }
}

fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escaping shared by tag keys, tag values and field keys.
fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Writes line protocol to any writer (a file, stdout, ...).
pub struct LineProtocolSink<W> {
    writer: W,
}

impl<W: Write> LineProtocolSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PointSink for LineProtocolSink<W> {
    async fn write(&mut self, points: &[Point]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        self.writer.write_all(to_lines(points).as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn point() -> Point {
        Point {
            timestamp: NaiveDate::from_ymd_opt(2021, 1, 1)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap(),
            measurement: "LAQN".to_string(),
            fields: BTreeMap::from([
                ("NO2".to_string(), FieldValue::Float(41.2)),
                ("Latitude".to_string(), FieldValue::Float(51.5)),
                ("Site Type".to_string(), FieldValue::Text("Kerbside".to_string())),
            ]),
            tags: BTreeMap::from([
                ("NO2 Units".to_string(), "ug m-3".to_string()),
                ("NO2 status".to_string(), "Ratified".to_string()),
                ("Site Code".to_string(), "A1".to_string()),
                ("Closed".to_string(), String::new()),
            ]),
        }
    }

    #[test]
    fn test_to_line() {
        assert_eq!(
            to_line(&point()).unwrap(),
            "LAQN,NO2\\ Units=ug\\ m-3,NO2\\ status=Ratified,Site\\ Code=A1 \
             Latitude=51.5,NO2=41.2,Site\\ Type=\"Kerbside\" 1609462800"
        );
    }

    #[test]
    fn test_field_values() {
        assert_eq!(field_value(&FieldValue::Float(38.0)).unwrap(), "38");
        assert_eq!(field_value(&FieldValue::Integer(7)).unwrap(), "7i");
        assert_eq!(field_value(&FieldValue::Boolean(true)).unwrap(), "true");
        assert_eq!(
            field_value(&FieldValue::Text("say \"hi\"".to_string())).unwrap(),
            "\"say \\\"hi\\\"\""
        );
        assert!(field_value(&FieldValue::Float(f64::INFINITY)).is_none());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_key("a,b=c d"), "a\\,b\\=c\\ d");
        assert_eq!(escape_measurement("air quality,x=1"), "air\\ quality\\,x=1");
    }

    #[tokio::test]
    async fn test_sink_writes_lines() -> Result<(), SinkError> {
        let mut sink = LineProtocolSink::new(Vec::new());
        sink.write(&[point(), point()]).await?;
        sink.write(&[]).await?;

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.ends_with('\n'));
        Ok(())
    }
}
