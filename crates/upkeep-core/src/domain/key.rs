//! Upkeep の識別子
//!
//! # 学習ポイント
//! - newtype パターン（String をそのまま渡さない）
//! - `#[serde(transparent)]` による透過的なシリアライズ
//!
//! [`UpkeepKey`] はエンジンにとって不透明な値で、キャッシュのキーとして値比較されるだけ。
//! block と id からの組み立て方は [`Encoder`](crate::ports::Encoder) が決める。
//! [`UpkeepKey::from_parts`] は [`KeyEncoder`](crate::impls::KeyEncoder) が読める
//! `block|id` 形式を作る。

use std::fmt;

use serde::{Deserialize, Serialize};

/// `block|id` 形式の区切り文字
pub const KEY_SEPARATOR: char = '|';

/// チェックを評価するチェーン上の位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(String);

impl BlockKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for BlockKey {
    fn from(block: u64) -> Self {
        Self(block.to_string())
    }
}

/// Registry が割り当てた upkeep の ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpkeepId(String);

impl UpkeepId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpkeepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1 件の upkeep チェックを識別するキー（block + upkeep id）
///
/// 等価性とハッシュはシリアライズ済みの文字列で決まる。
/// 同じ部品から作ったキーはキャッシュ上で区別されない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpkeepKey(String);

impl UpkeepKey {
    /// シリアライズ済みのキーを包む
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `block|id` 形式を組み立てる
    pub fn from_parts(block: &BlockKey, id: &UpkeepId) -> Self {
        Self(format!("{}{}{}", block.as_str(), KEY_SEPARATOR, id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpkeepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UpkeepKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_joins_with_separator() {
        let key = UpkeepKey::from_parts(&BlockKey::from(42), &UpkeepId::new("7"));
        assert_eq!(key.as_str(), "42|7");
        assert_eq!(key.to_string(), "42|7");
    }

    #[test]
    fn keys_compare_by_serialized_form() {
        let a = UpkeepKey::from_parts(&BlockKey::new("1"), &UpkeepId::new("abc"));
        let b = UpkeepKey::new("1|abc");
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn keys_serialize_transparently() {
        let key = UpkeepKey::new("9|1");
        let s = serde_json::to_string(&key).unwrap();
        assert_eq!(s, "\"9|1\"");
    }
}
