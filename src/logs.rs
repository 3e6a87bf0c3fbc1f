//! Per-hook metric logs.
//!
//! The driver builds a fresh [`Logs`] for each hook call. Callbacks read it and
//! may add derived keys (for example `examples_seen`), which are visible to any
//! callback invoked later in the same hook.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{HookError, Result};

/// Log key carrying the number of examples in the current minibatch.
pub const SIZE_KEY: &str = "size";

/// Log key written by [`History`](crate::callback::History) with the running example count.
pub const EXAMPLES_SEEN_KEY: &str = "examples_seen";

/// Per-key sequences of logged values.
pub type MetricHistory = BTreeMap<String, Vec<LogValue>>;

/// A single logged value.
///
/// Serialized as a bare JSON scalar. Non-finite floats are written as the
/// strings `"NaN"`, `"inf"` and `"-inf"` and read back as floats, so a text
/// value spelled exactly like one of them reloads as a float. `null` reads as NaN.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "LogValueRepr")]
pub enum LogValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogValueRepr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl From<LogValueRepr> for LogValue {
    fn from(repr: LogValueRepr) -> Self {
        match repr {
            LogValueRepr::Bool(b) => LogValue::Bool(b),
            LogValueRepr::Int(i) => LogValue::Int(i),
            LogValueRepr::Float(v) => LogValue::Float(v),
            LogValueRepr::Text(s) => match non_finite::parse_tag(&s) {
                Some(v) => LogValue::Float(v),
                None => LogValue::Text(s),
            },
            LogValueRepr::Null => LogValue::Float(f64::NAN),
        }
    }
}

impl Serialize for LogValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LogValue::Bool(b) => serializer.serialize_bool(*b),
            LogValue::Int(i) => serializer.serialize_i64(*i),
            LogValue::Float(v) => non_finite::serialize(v, serializer),
            LogValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Serde helpers for floats that may be NaN or infinite.
///
/// JSON has no literal for them and `serde_json` would write `null`, which a
/// plain `f64` field cannot read back. Use with `#[serde(with = "...")]`.
pub(crate) mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Tag(String),
        Null,
    }

    impl Repr {
        fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
            match self {
                Repr::Number(v) => Ok(v),
                Repr::Null => Ok(f64::NAN),
                Repr::Tag(s) => {
                    parse_tag(&s).ok_or_else(|| E::custom(format!("expected a number, got {s:?}")))
                }
            }
        }
    }

    pub(crate) fn parse_tag(s: &str) -> Option<f64> {
        match s {
            "NaN" => Some(f64::NAN),
            "inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            _ => None,
        }
    }

    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            // Display gives exactly "NaN", "inf" and "-inf"
            serializer.collect_str(value)
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Repr::deserialize(deserializer)?.into_f64()
    }

    /// Same encoding for an optional float; `null` stays `None`
    pub(crate) mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub(crate) fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Option::<super::Repr>::deserialize(deserializer)?
                .map(|repr| repr.into_f64::<D::Error>())
                .transpose()
        }
    }
}

impl LogValue {
    /// Coerce to a float.
    ///
    /// Booleans map to 0/1 and text is parsed; anything unparseable is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LogValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            LogValue::Int(i) => Some(*i as f64),
            LogValue::Float(f) => Some(*f),
            LogValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Non-negative integer view, used for example counts.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            LogValue::Int(i) => u64::try_from(*i).ok(),
            LogValue::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64 => {
                Some(*f as u64)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Bool(b) => write!(f, "{b}"),
            LogValue::Int(i) => write!(f, "{i}"),
            LogValue::Float(v) => write!(f, "{v}"),
            LogValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for LogValue {
    fn from(v: bool) -> Self {
        LogValue::Bool(v)
    }
}

impl From<i64> for LogValue {
    fn from(v: i64) -> Self {
        LogValue::Int(v)
    }
}

impl From<u64> for LogValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(LogValue::Int).unwrap_or(LogValue::Float(v as f64))
    }
}

impl From<usize> for LogValue {
    fn from(v: usize) -> Self {
        LogValue::from(v as u64)
    }
}

impl From<f64> for LogValue {
    fn from(v: f64) -> Self {
        LogValue::Float(v)
    }
}

impl From<f32> for LogValue {
    fn from(v: f32) -> Self {
        LogValue::Float(f64::from(v))
    }
}

impl From<&str> for LogValue {
    fn from(v: &str) -> Self {
        LogValue::Text(v.to_string())
    }
}

impl From<String> for LogValue {
    fn from(v: String) -> Self {
        LogValue::Text(v)
    }
}

/// Metric name → value mapping passed to every hook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logs {
    entries: BTreeMap<String, LogValue>,
}

impl Logs {
    /// Create empty logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<LogValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LogValue>) -> Option<LogValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.entries.get(key)
    }

    /// Value coerced to `f64`, `None` if absent or non-numeric
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(LogValue::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<LogValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LogValue)> {
        self.entries.iter()
    }

    /// Minibatch size from the `size` key.
    ///
    /// Batch-triggered callbacks cannot count examples without it, so a missing
    /// key is a hard error attributed to `callback`.
    pub fn size(&self, callback: &'static str) -> Result<u64> {
        let value = self
            .get(SIZE_KEY)
            .ok_or_else(|| HookError::MissingLogKey { key: SIZE_KEY.to_string(), callback })?;
        value.as_count().ok_or_else(|| HookError::InvalidLogValue {
            key: SIZE_KEY.to_string(),
            message: format!("expected a non-negative integer, got {value}"),
        })
    }
}

impl<K: Into<String>, V: Into<LogValue>> FromIterator<(K, V)> for Logs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl<'a> IntoIterator for &'a Logs {
    type Item = (&'a String, &'a LogValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, LogValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64_coercion() {
        assert_eq!(LogValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(LogValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(LogValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(LogValue::Text(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(LogValue::Text("resnet18".into()).as_f64(), None);
    }

    #[test]
    fn test_size_missing_is_error() {
        let logs = Logs::new().with("loss", 0.3);
        let err = logs.size("History").unwrap_err();
        assert!(matches!(err, HookError::MissingLogKey { callback: "History", .. }));
    }

    #[test]
    fn test_size_rejects_negative_and_text() {
        assert!(matches!(
            Logs::new().with("size", -4i64).size("X"),
            Err(HookError::InvalidLogValue { .. })
        ));
        assert!(matches!(
            Logs::new().with("size", "ten").size("X"),
            Err(HookError::InvalidLogValue { .. })
        ));
        assert_eq!(Logs::new().with("size", 32.0).size("X").unwrap(), 32);
    }

    #[test]
    fn test_logs_json_is_flat_map() {
        let logs = Logs::new().with("acc", 0.75).with("size", 16i64).with("phase", "train");
        let json = serde_json::to_string(&logs).unwrap();
        assert_eq!(json, r#"{"acc":0.75,"phase":"train","size":16}"#);

        let back: Logs = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("size"), Some(&LogValue::Int(16)));
        assert_eq!(back, logs);
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let mut history = MetricHistory::new();
        history.insert(
            "loss".into(),
            vec![
                LogValue::Float(0.5),
                LogValue::Float(f64::NAN),
                LogValue::Float(f64::INFINITY),
                LogValue::Float(f64::NEG_INFINITY),
            ],
        );
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"loss":[0.5,"NaN","inf","-inf"]}"#);

        let back: MetricHistory = serde_json::from_str(&json).unwrap();
        let loss: Vec<f64> = back["loss"].iter().filter_map(LogValue::as_f64).collect();
        assert_eq!(loss[0], 0.5);
        assert!(loss[1].is_nan());
        assert_eq!(loss[2], f64::INFINITY);
        assert_eq!(loss[3], f64::NEG_INFINITY);
    }

    #[test]
    fn test_null_reads_as_nan() {
        let logs: Logs = serde_json::from_str(r#"{"loss":null,"phase":"train"}"#).unwrap();
        assert!(matches!(logs.get("loss"), Some(LogValue::Float(v)) if v.is_nan()));
        assert_eq!(logs.get("phase"), Some(&LogValue::Text("train".into())));
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Wrapped {
        #[serde(with = "non_finite")]
        value: f64,
        #[serde(with = "non_finite::option")]
        best: Option<f64>,
    }

    #[test]
    fn test_non_finite_field_helpers() {
        let json = serde_json::to_string(&Wrapped { value: f64::NAN, best: Some(f64::NEG_INFINITY) })
            .unwrap();
        assert_eq!(json, r#"{"value":"NaN","best":"-inf"}"#);
        let back: Wrapped = serde_json::from_str(&json).unwrap();
        assert!(back.value.is_nan());
        assert_eq!(back.best, Some(f64::NEG_INFINITY));

        let back: Wrapped = serde_json::from_str(r#"{"value":1.5,"best":null}"#).unwrap();
        assert_eq!((back.value, back.best), (1.5, None));
        assert!(serde_json::from_str::<Wrapped>(r#"{"value":"fast","best":null}"#).is_err());
    }

    #[test]
    fn test_from_iterator() {
        let logs: Logs = vec![("a", 1.0), ("b", 2.0)].into_iter().collect();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs.get_f64("b"), Some(2.0));
    }
}
