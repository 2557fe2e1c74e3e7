use crate::error::{HygroError, Result};
use crate::model::Record;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 快照解析与校验规则
///
/// 快照支持两种 JSON 编码：
/// * 平铺：`{"timestamp": "...", "location": "office", "temperature": 21.4}`，
///   字符串值作为 tag，数值或 null 作为 field；
/// * 结构化：`{"timestamp": "...", "tags": {...}, "fields": {...}}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// 时间戳所在的键
    #[serde(default = "default_timestamp_key")]
    pub timestamp_key: String,

    /// 必填字段，任一缺失或为 null 则记录无效
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
}

fn default_timestamp_key() -> String {
    "timestamp".to_string()
}

fn default_required_fields() -> Vec<String> {
    vec!["temperature".to_string(), "humidity".to_string()]
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            timestamp_key: default_timestamp_key(),
            required_fields: default_required_fields(),
        }
    }
}

impl RecordSchema {
    /// 解析快照内容（不做校验）
    pub fn parse(&self, raw: &[u8]) -> Result<Record> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| HygroError::parse(format!("snapshot is not valid JSON: {}", e)))?;

        let Value::Object(map) = value else {
            return Err(HygroError::parse("snapshot must be a JSON object"));
        };

        let timestamp = match map.get(&self.timestamp_key) {
            Some(value) => parse_timestamp(value)?,
            None => {
                return Err(HygroError::parse(format!(
                    "snapshot has no '{}' key",
                    self.timestamp_key
                )))
            }
        };

        let structured = matches!(map.get("tags"), Some(Value::Object(_)))
            || matches!(map.get("fields"), Some(Value::Object(_)));

        if structured {
            self.parse_structured(timestamp, &map)
        } else {
            self.parse_flat(timestamp, &map)
        }
    }

    /// 解析并校验
    pub fn extract(&self, raw: &[u8]) -> Result<Record> {
        let record = self.parse(raw)?;
        self.validate(&record)?;
        Ok(record)
    }

    /// 校验必填字段
    pub fn validate(&self, record: &Record) -> Result<()> {
        for name in &self.required_fields {
            match record.fields.get(name) {
                Some(Some(value)) if value.is_finite() => {}
                Some(Some(value)) => {
                    return Err(HygroError::invalid_record(format!(
                        "field '{}' is not finite: {}",
                        name, value
                    )))
                }
                Some(None) => {
                    return Err(HygroError::invalid_record(format!("field '{}' is null", name)))
                }
                None => {
                    return Err(HygroError::invalid_record(format!(
                        "field '{}' is missing",
                        name
                    )))
                }
            }
        }

        if let Some((name, value)) = record.present_fields().find(|(_, v)| !v.is_finite()) {
            return Err(HygroError::invalid_record(format!(
                "field '{}' is not finite: {}",
                name, value
            )));
        }

        Ok(())
    }

    fn parse_flat(&self, timestamp: DateTime<Utc>, map: &Map<String, Value>) -> Result<Record> {
        let mut record = Record::new(timestamp);

        for (key, value) in map {
            if key == &self.timestamp_key {
                continue;
            }
            match value {
                Value::String(s) => {
                    record.tags.insert(key.clone(), s.clone());
                }
                Value::Number(_) | Value::Null => {
                    record.fields.insert(key.clone(), field_value(key, value)?);
                }
                other => {
                    return Err(HygroError::parse(format!(
                        "unsupported value for '{}': {}",
                        key, other
                    )))
                }
            }
        }

        Ok(record)
    }

    fn parse_structured(
        &self,
        timestamp: DateTime<Utc>,
        map: &Map<String, Value>,
    ) -> Result<Record> {
        let mut record = Record::new(timestamp);

        if let Some(tags) = map.get("tags") {
            let Value::Object(tags) = tags else {
                return Err(HygroError::parse("'tags' must be an object"));
            };
            for (key, value) in tags {
                match value {
                    Value::String(s) => {
                        record.tags.insert(key.clone(), s.clone());
                    }
                    other => {
                        return Err(HygroError::parse(format!(
                            "tag '{}' must be a string, got {}",
                            key, other
                        )))
                    }
                }
            }
        }

        if let Some(fields) = map.get("fields") {
            let Value::Object(fields) = fields else {
                return Err(HygroError::parse("'fields' must be an object"));
            };
            for (key, value) in fields {
                record.fields.insert(key.clone(), field_value(key, value)?);
            }
        }

        Ok(record)
    }
}

fn field_value(key: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| HygroError::parse(format!("field '{}' is out of range", key))),
        other => Err(HygroError::parse(format!(
            "field '{}' must be numeric or null, got {}",
            key, other
        ))),
    }
}

/// 解析时间戳
///
/// 接受 RFC 3339（任意时区，统一转换为 UTC）、无时区的
/// `YYYY-MM-DD HH:MM:SS[.fff]`（按 UTC 解释）以及 Unix 秒。
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| HygroError::parse(format!("unsupported epoch timestamp: {}", n)))?;
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| HygroError::parse(format!("epoch timestamp out of range: {}", secs)))
        }
        other => Err(HygroError::parse(format!("unsupported timestamp: {}", other))),
    }
}

pub fn parse_timestamp_str(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(HygroError::parse(format!("unrecognized timestamp '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp_str(raw).unwrap()
    }

    #[test]
    fn test_parse_flat_snapshot() {
        let schema = RecordSchema::default();
        let raw = br#"{"timestamp": "2021-03-01 12:00:00", "location": "office", "temperature": 21.5, "humidity": 40}"#;

        let record = schema.extract(raw).unwrap();
        assert_eq!(record.timestamp, ts("2021-03-01T12:00:00Z"));
        assert_eq!(record.tags.get("location").map(String::as_str), Some("office"));
        assert_eq!(record.field("temperature"), Some(21.5));
        assert_eq!(record.field("humidity"), Some(40.0));
    }

    #[test]
    fn test_parse_structured_snapshot() {
        let schema = RecordSchema::default();
        let raw = br#"{
            "timestamp": "2021-03-01T13:00:00+01:00",
            "tags": {"location": "garage"},
            "fields": {"temperature": 8.25, "humidity": 71.0}
        }"#;

        let record = schema.extract(raw).unwrap();
        assert_eq!(record.timestamp, ts("2021-03-01 12:00:00"));
        assert_eq!(record.tags.get("location").map(String::as_str), Some("garage"));
        assert_eq!(record.field("humidity"), Some(71.0));
    }

    #[test]
    fn test_null_required_field_is_invalid() {
        let schema = RecordSchema::default();
        let raw = br#"{"timestamp": "2021-03-01 12:00:00", "temperature": 21.5, "humidity": null}"#;

        let record = schema.parse(raw).unwrap();
        assert_eq!(record.fields.get("humidity"), Some(&None));

        let err = schema.extract(raw).unwrap_err();
        assert!(matches!(err, HygroError::InvalidRecord(_)));
    }

    #[test]
    fn test_missing_required_field_is_invalid() {
        let schema = RecordSchema::default();
        let raw = br#"{"timestamp": "2021-03-01 12:00:00", "temperature": 21.5}"#;

        let err = schema.extract(raw).unwrap_err();
        assert!(matches!(err, HygroError::InvalidRecord(_)));
    }

    #[test]
    fn test_optional_null_field_is_accepted() {
        let schema = RecordSchema::default();
        let raw = br#"{"timestamp": "2021-03-01 12:00:00", "temperature": 21.5, "humidity": 40, "pressure": null}"#;

        let record = schema.extract(raw).unwrap();
        assert_eq!(record.fields.get("pressure"), Some(&None));
    }

    #[test]
    fn test_unparsable_timestamp() {
        let schema = RecordSchema::default();
        let raw = br#"{"timestamp": "yesterday", "temperature": 21.5, "humidity": 40}"#;

        let err = schema.parse(raw).unwrap_err();
        assert!(matches!(err, HygroError::Parse(_)));
    }

    #[test]
    fn test_non_object_snapshot() {
        let schema = RecordSchema::default();
        assert!(matches!(schema.parse(b"[1, 2]"), Err(HygroError::Parse(_))));
        assert!(matches!(schema.parse(b"not json"), Err(HygroError::Parse(_))));
        assert!(matches!(
            schema.parse(br#"{"timestamp": "2021-03-01 12:00:00", "ok": true}"#),
            Err(HygroError::Parse(_))
        ));
    }

    #[test]
    fn test_custom_timestamp_key() {
        let schema = RecordSchema {
            timestamp_key: "time".to_string(),
            required_fields: vec!["temperature".to_string()],
        };
        let raw = br#"{"time": 1614600000, "temperature": 19.0}"#;

        let record = schema.extract(raw).unwrap();
        assert_eq!(record.timestamp, ts("2021-03-01T12:00:00Z"));
    }

    #[test]
    fn test_fractional_seconds() {
        assert_eq!(
            ts("2021-03-01 12:00:00.250"),
            ts("2021-03-01T12:00:00.250Z")
        );
    }
}
