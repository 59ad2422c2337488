//! 消息元数据（MetaData）
//!
//! 不可变的键值映射，承载关联追踪等横切信息（correlation data）：
//! - 所有“修改”操作都返回新的 `MetaData`，不会改动接收者；
//! - `merged_with` 为右偏合并：同名键以参数一侧的值为准；
//! - `MetaData::empty()` 是合并运算的单位元；
//! - 相等性按结构比较，与插入顺序无关。
//!
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;

/// 不可变的关联元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaData(BTreeMap<String, Value>);

impl MetaData {
    /// 空元数据
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// 从可选映射创建快照，`None` 或空映射得到空元数据
    pub fn from_map<K, V, I>(mapping: Option<I>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        mapping
            .map(|entries| entries.into_iter().collect())
            .unwrap_or_default()
    }

    /// 仅包含一个键值对的元数据
    pub fn with_entry(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::empty().with(key, value)
    }

    /// 返回追加（或覆盖）了 `key` 的新元数据
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut entries = self.0.clone();
        entries.insert(key.into(), value.into());
        Self(entries)
    }

    /// 返回去掉 `key` 的新元数据
    pub fn without(&self, key: &str) -> Self {
        if !self.0.contains_key(key) {
            return self.clone();
        }

        let mut entries = self.0.clone();
        entries.remove(key);
        Self(entries)
    }

    /// 右偏合并：同名键以 `other` 为准
    pub fn merged_with(&self, other: &MetaData) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let mut entries = self.0.clone();
        entries.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(entries)
    }

    /// 仅保留给定键
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        keys.into_iter()
            .filter_map(|k| self.0.get_key_value(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// 以字符串读取某个键（非字符串值返回 `None`）
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl Deref for MetaData {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> FromIterator<(K, V)> for MetaData
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for MetaData {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self(entries)
    }
}

impl From<HashMap<String, Value>> for MetaData {
    fn from(entries: HashMap<String, Value>) -> Self {
        entries.into_iter().collect()
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for MetaData
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a MetaData {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::MetaData;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    #[test]
    fn merged_with_is_right_biased() {
        let a = MetaData::from([("foo", json!("bar")), ("a", json!(1))]);
        let b = MetaData::from([("foo", json!("baz")), ("b", json!(true))]);

        let merged = a.merged_with(&b);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("foo"), Some(&json!("baz")));
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(true)));

        // 接收者与参数均未被修改
        assert_eq!(a.get("foo"), Some(&json!("bar")));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn empty_is_identity_for_merge() {
        let a = MetaData::from([("k", json!("v"))]);
        assert_eq!(a.merged_with(&MetaData::empty()), a);
        assert_eq!(MetaData::empty().merged_with(&a), a);
        assert_eq!(MetaData::empty().merged_with(&MetaData::empty()), MetaData::empty());
    }

    #[test]
    fn repeated_merges_are_deterministic() {
        let sources = [
            MetaData::from([("k", json!(1)), ("x", json!("a"))]),
            MetaData::from([("k", json!(2))]),
            MetaData::from([("k", json!(3)), ("y", json!("b"))]),
        ];

        let left = sources
            .iter()
            .fold(MetaData::empty(), |acc, md| acc.merged_with(md));
        let grouped = sources[0].merged_with(&sources[1].merged_with(&sources[2]));

        assert_eq!(left, grouped);
        assert_eq!(left.get("k"), Some(&json!(3)));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a: MetaData = vec![("x", json!(1)), ("y", json!(2))].into_iter().collect();
        let b: MetaData = vec![("y", json!(2)), ("x", json!(1))].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn absent_or_empty_mapping_yields_empty() {
        let none: Option<HashMap<String, Value>> = None;
        assert_eq!(MetaData::from_map(none), MetaData::empty());
        assert!(MetaData::from(HashMap::<String, Value>::new()).is_empty());
    }

    #[test]
    fn with_and_without_return_new_values() {
        let base = MetaData::with_entry("trace_id", "t-1");
        let extended = base.with("user", "alice");
        let reduced = extended.without("trace_id");

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced.get_str("user"), Some("alice"));
        assert_eq!(base.without("missing"), base);
    }

    #[test]
    fn subset_keeps_only_listed_keys() {
        let md = MetaData::from([("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        let sub = md.subset(["a", "c", "missing"]);
        assert_eq!(sub, MetaData::from([("a", json!(1)), ("c", json!(3))]));
    }

    #[test]
    fn serializes_as_plain_object() {
        let md = MetaData::from([("foo", json!("bar"))]);
        let value = serde_json::to_value(&md).unwrap();
        assert_eq!(value, json!({"foo": "bar"}));

        let back: MetaData = serde_json::from_value(value).unwrap();
        assert_eq!(back, md);
    }
}
