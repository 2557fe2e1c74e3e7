use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 修订标识（提交哈希）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 日志中使用的短哈希
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RevisionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 提交日志中的一个不可变修订
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub predecessor: Option<RevisionId>,
}

impl Revision {
    pub fn new(id: impl Into<RevisionId>, predecessor: Option<RevisionId>) -> Self {
        Self {
            id: id.into(),
            predecessor,
        }
    }
}

/// 复制检查点：上一次完整运行时看到的最新修订，首次运行时为空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(Option<RevisionId>);

impl Checkpoint {
    pub fn unset() -> Self {
        Self(None)
    }

    pub fn at(revision: impl Into<RevisionId>) -> Self {
        Self(Some(revision.into()))
    }

    pub fn revision(&self) -> Option<&RevisionId> {
        self.0.as_ref()
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    /// 遍历到该修订时停止
    pub fn matches(&self, revision: &RevisionId) -> bool {
        self.0.as_ref() == Some(revision)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("<unset>"),
        }
    }
}

/// 传感器读数记录
///
/// 字段值为 `None` 表示传感器当次读数为 null。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, Option<f64>>,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Option<f64>>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).copied().flatten()
    }

    /// 非 null 的字段
    pub fn present_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.map(|value| (k.as_str(), value)))
    }
}
