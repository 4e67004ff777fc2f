use std::collections::BTreeMap;

use draftgen_core::geometry::Point2;
use serde::{Deserialize, Serialize};

use crate::errors::AssemblyError;

/// 属性值：文本、数值或二维点。JSON 输入按形状自动区分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Point([f64; 2]),
    Text(String),
}

impl AttrValue {
    /// 渲染为替换进属性槽的文本。整数值不带小数点。
    pub fn display(&self) -> String {
        match self {
            AttrValue::Number(value) => format!("{value}"),
            AttrValue::Point([x, y]) => format!("{x}, {y}"),
            AttrValue::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<Point2> for AttrValue {
    fn from(value: Point2) -> Self {
        AttrValue::Point([value.x(), value.y()])
    }
}

/// 一次组装运行的共享属性记录。键一律大写；
/// 预处理阶段写入派生字段，替换阶段只读。
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord(BTreeMap<String, AttrValue>);

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个字段，键会被规范化为大写。
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<AttrValue>) {
        self.0
            .insert(key.as_ref().to_uppercase(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// 必填字段的文本形式，缺失时报 MissingField。
    pub fn require_display(&self, key: &str) -> Result<String, AssemblyError> {
        self.get(key)
            .map(AttrValue::display)
            .ok_or_else(|| AssemblyError::MissingField(key.to_string()))
    }

    /// 可选文本字段。存在但非文本时也按文本形式返回。
    pub fn get_display(&self, key: &str) -> Option<String> {
        self.get(key).map(AttrValue::display)
    }

    pub fn require_number(&self, key: &str) -> Result<f64, AssemblyError> {
        match self.get(key) {
            Some(AttrValue::Number(value)) => Ok(*value),
            Some(other) => Err(AssemblyError::InvalidField {
                key: key.to_string(),
                value: other.display(),
            }),
            None => Err(AssemblyError::MissingField(key.to_string())),
        }
    }

    pub fn require_point(&self, key: &str) -> Result<Point2, AssemblyError> {
        match self.get(key) {
            Some(AttrValue::Point([x, y])) => Ok(Point2::new(*x, *y)),
            Some(other) => Err(AssemblyError::InvalidField {
                key: key.to_string(),
                value: other.display(),
            }),
            None => Err(AssemblyError::MissingField(key.to_string())),
        }
    }
}

impl FromIterator<(String, AttrValue)> for AttributeRecord {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.set(key, value);
        }
        record
    }
}
