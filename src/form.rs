use super::{PayloadError, PayloadResult};
use std::{
    any::{type_name, Any},
    collections::{btree_map, BTreeMap, HashMap},
    hash::BuildHasher,
};

/// 表单数据
///
/// 同一个字段可以对应多个值，字段按照字典序排列，同一字段下的值保持插入顺序，
/// 因此相同内容的表单总是编码出相同的请求体。
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct FormValues {
    inner: BTreeMap<String, Vec<String>>,
}

impl FormValues {
    /// 创建空表单
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// 尝试将任意值转换为表单
    ///
    /// 仅支持 `FormValues`，`HashMap<String, String>`，`HashMap<String, Vec<String>>`
    /// 以及对应的 `BTreeMap`，其他类型均返回 [`PayloadError::UnsupportedFormShape`]
    pub fn from_any<T: Any>(value: T) -> PayloadResult<Self> {
        let mut value: Box<dyn Any> = Box::new(value);
        value = match value.downcast::<Self>() {
            Ok(values) => return Ok(*values),
            Err(value) => value,
        };
        value = match value.downcast::<HashMap<String, String>>() {
            Ok(map) => return Ok((*map).into()),
            Err(value) => value,
        };
        value = match value.downcast::<HashMap<String, Vec<String>>>() {
            Ok(map) => return Ok((*map).into()),
            Err(value) => value,
        };
        value = match value.downcast::<BTreeMap<String, String>>() {
            Ok(map) => return Ok((*map).into()),
            Err(value) => value,
        };
        match value.downcast::<BTreeMap<String, Vec<String>>>() {
            Ok(map) => Ok((*map).into()),
            Err(_) => Err(PayloadError::UnsupportedFormShape {
                type_name: type_name::<T>(),
            }),
        }
    }

    /// 设置字段的值，替换该字段已有的所有值
    #[inline]
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.insert(key.into(), vec![value.into()]);
        self
    }

    /// 为字段追加一个值
    #[inline]
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.entry(key.into()).or_default().push(value.into());
        self
    }

    /// 获取字段的第一个值
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// 获取字段的所有值
    #[inline]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.inner.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// 是否包含字段
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// 删除字段，返回该字段原有的值
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.inner.remove(key)
    }

    /// 字段数量
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// 表单是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 按字段遍历表单
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.inner.iter())
    }

    /// 按键值对遍历表单，重复的字段会出现多次
    #[inline]
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value.as_str())))
    }

    /// 编码为 `application/x-www-form-urlencoded` 格式
    pub fn encode(&self) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            form.append_pair(key, value);
        }
        form.finish()
    }
}

/// 表单字段迭代器
#[derive(Debug, Clone)]
pub struct Iter<'a>(btree_map::Iter<'a, String, Vec<String>>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> IntoIterator for &'a FormValues {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for FormValues {
    #[inline]
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    #[inline]
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut values = Self::new();
        values.extend(iter);
        values
    }
}

impl<S: BuildHasher> From<HashMap<String, String, S>> for FormValues {
    #[inline]
    fn from(map: HashMap<String, String, S>) -> Self {
        map.into_iter().collect()
    }
}

impl<S: BuildHasher> From<HashMap<String, Vec<String>, S>> for FormValues {
    #[inline]
    fn from(map: HashMap<String, Vec<String>, S>) -> Self {
        map.into_iter()
            .flat_map(|(key, values)| values.into_iter().map(move |value| (key.to_owned(), value)))
            .collect()
    }
}

impl From<BTreeMap<String, String>> for FormValues {
    #[inline]
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, Vec<String>>> for FormValues {
    #[inline]
    fn from(inner: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            inner: inner.into_iter().filter(|(_, values)| !values.is_empty()).collect(),
        }
    }
}
