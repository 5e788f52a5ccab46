//! Conversion between document elements and the mapping view used by callers.
//!
//! An element with no children becomes a scalar (its trimmed text), or `Value::Absent` if it has
//! no text, so callers can tell "present but empty" (`<disabled/>`) from "not there at all".
//!
//! Anything with children or attributes becomes a `Record`.  A leaf with both attributes and
//! text keeps its text on the record, and still reads as that text through `Value::as_str`.
//! Attributes are added first, then children are
//! folded by tag: the first child with a given tag becomes a plain entry, and a second child
//! with the same tag turns the entry into a `Value::List`.  Writing a record back out applies
//! the same rule in reverse, so a list turns back into sibling elements in order.
//!
//! One consequence of folding is that a collection with a single member reads back as a plain
//! entry rather than a list of one; use `Value::items` or `Record::scalars` when a field may
//! hold either.

use indexmap::{IndexMap, IndexSet};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::slice;

use super::element::Element;

/// Key a record's own text is serialized under; it can't clash with a tag or attribute name.
const TEXT_KEY: &str = "#text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An element that exists but has no text, like a `<disabled/>` marker.
    Absent,
    Scalar(String),
    Record(Record),
    /// Repeated sibling elements sharing a tag, in document order.
    List(Vec<Value>),
}

impl Value {
    /// Converts a document element to its mapping view.
    pub fn from_element(element: &Element) -> Value {
        let text = element
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && element.is_leaf());
        if element.is_leaf() && element.attributes.is_empty() {
            return match text {
                Some(text) => Value::Scalar(text.to_string()),
                None => Value::Absent,
            };
        }

        let mut record = Record::new();
        record.text = text.map(str::to_string);
        for (key, value) in &element.attributes {
            record.insert_attribute(key.as_str(), value.as_str());
        }
        for child in &element.children {
            record.push(child.tag.as_str(), Value::from_element(child));
        }
        Value::Record(record)
    }

    /// Converts the value back to elements with the given tag.  Lists expand to one element
    /// per item; everything else produces exactly one element, including `Absent`, which
    /// becomes an empty element rather than being dropped.
    pub fn to_elements(&self, tag: &str) -> Vec<Element> {
        match self {
            Value::Absent => vec![Element::new(tag)],
            Value::Scalar(text) => vec![Element::with_text(tag, text.as_str())],
            Value::Record(record) => vec![record.to_element(tag)],
            Value::List(items) => items.iter().flat_map(|i| i.to_elements(tag)).collect(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Record(r) => r.text(),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the items of a list, or the value itself as a single item otherwise.
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => slice::from_ref(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Absent => serializer.serialize_none(),
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::Record(r) => r.serialize(serializer),
            Value::List(items) => serializer.collect_seq(items),
        }
    }
}

/// An ordered mapping of field name to value, built from an element's attributes and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, Value>,
    // Fields that came from attributes, so they can be written back as attributes.
    attributes: IndexSet<String>,
    // Text of a leaf that also has attributes.
    text: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the field's text if it's a scalar.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Returns the scalars held by a field that may be missing, a single entry, or a list.
    pub fn scalars(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.items()
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets a field, replacing (in place) any existing value.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<Value>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into())
    }

    /// Sets a field that should be written as an attribute of the element.
    pub fn insert_attribute<K, V>(&mut self, key: K, value: V) -> Option<Value>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        self.attributes.insert(key.clone());
        self.fields.insert(key, Value::Scalar(value.into()))
    }

    /// Adds a value under the key using the folding rule: a new key gets a plain entry, and a
    /// repeated key becomes a list.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let value = value.into();
        match self.fields.entry(key.into()) {
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
            indexmap::map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::List(items) => items.push(value),
                existing => {
                    let first = std::mem::replace(existing, Value::Absent);
                    *existing = Value::List(vec![first, value]);
                }
            },
        }
    }

    /// Removes a field, keeping the order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.shift_remove(key);
        self.fields.shift_remove(key)
    }

    pub fn is_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    /// Returns the element's own text, if it's a leaf with attributes and text.  Records with
    /// child fields have no text.
    pub fn text(&self) -> Option<&str> {
        if self.keys().any(|k| !self.is_attribute(k)) {
            return None;
        }
        self.text.as_deref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Converts the record to an element with the given tag.
    pub fn to_element(&self, tag: &str) -> Element {
        let mut element = Element::new(tag);
        for (key, value) in &self.fields {
            match value {
                Value::Scalar(text) if self.is_attribute(key) => {
                    element.attributes.push((key.clone(), text.clone()))
                }
                other => element.children.extend(other.to_elements(key)),
            }
        }
        if element.is_leaf() {
            element.text = self.text().map(str::to_string);
        }
        element
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        if let Some(text) = self.text() {
            map.serialize_entry(TEXT_KEY, text)?;
        }
        map.end()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

#[cfg(test)]
mod test {
    use super::{Record, Value};
    use crate::element::Element;

    static USER: &str = r#"<user uuid="u-1">
        <name>bob</name>
        <descr>  Bob Smith  </descr>
        <scope>user</scope>
        <groupname>admins</groupname>
        <groupname>staff</groupname>
        <priv>page-all</priv>
        <disabled></disabled>
        <authorizedkeys/>
        <ipsecpsk>  </ipsecpsk>
        <dashboard><widget>one</widget></dashboard>
        <uid>2000</uid>
    </user>"#;

    fn user() -> Record {
        Value::from_element(&Element::parse(USER).unwrap())
            .into_record()
            .unwrap()
    }

    #[test]
    fn leaves() {
        let user = user();
        assert_eq!(user.get_str("name"), Some("bob"));
        // Text is trimmed.
        assert_eq!(user.get_str("descr"), Some("Bob Smith"));
        // Empty and whitespace-only leaves are absent, not empty strings.
        assert_eq!(user.get("disabled"), Some(&Value::Absent));
        assert_eq!(user.get("authorizedkeys"), Some(&Value::Absent));
        assert_eq!(user.get("ipsecpsk"), Some(&Value::Absent));
        // ...and distinct from fields that aren't there.
        assert_eq!(user.get("expires"), None);
    }

    #[test]
    fn attributes_come_first() {
        let user = user();
        assert_eq!(user.keys().next().unwrap(), "uuid");
        assert!(user.is_attribute("uuid"));
        assert_eq!(user.get_str("uuid"), Some("u-1"));
        assert!(!user.is_attribute("name"));
    }

    #[test]
    fn repeated_tags_fold_into_list() {
        let user = user();
        assert_eq!(
            user.get("groupname"),
            Some(&Value::List(vec!["admins".into(), "staff".into()]))
        );
        // Single occurrences stay plain entries.
        assert_eq!(user.get("priv"), Some(&Value::from("page-all")));
        assert_eq!(user.scalars("priv"), vec!["page-all"]);
        assert_eq!(user.scalars("groupname"), vec!["admins", "staff"]);
        assert!(user.scalars("missing").is_empty());
    }

    #[test]
    fn nested_records() {
        let user = user();
        let dashboard = user.get("dashboard").and_then(Value::as_record).unwrap();
        assert_eq!(dashboard.get_str("widget"), Some("one"));
    }

    #[test]
    fn round_trip_keeps_fields_and_order() {
        let original = Element::parse(USER).unwrap();
        let record = Value::from_element(&original).into_record().unwrap();
        let rebuilt = record.to_element("user");

        assert_eq!(rebuilt.attribute("uuid"), Some("u-1"));
        let tags: Vec<_> = rebuilt.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "name",
                "descr",
                "scope",
                "groupname",
                "groupname",
                "priv",
                "disabled",
                "authorizedkeys",
                "ipsecpsk",
                "dashboard",
                "uid"
            ]
        );
        // Converting again gives the same record.
        assert_eq!(Value::from_element(&rebuilt), Value::Record(record));
    }

    #[test]
    fn absent_is_written_as_empty_element() {
        let mut record = Record::new();
        record.insert("name", "bob");
        record.insert("disabled", Value::Absent);
        let element = record.to_element("user");
        let disabled = element.child("disabled").unwrap();
        assert!(disabled.is_leaf());
        assert_eq!(disabled.text, None);
    }

    #[test]
    fn list_expands_to_siblings() {
        let mut record = Record::new();
        record.insert("name", "admins");
        record.insert("member", vec![Value::from("2000"), Value::from("2001")]);
        let element = record.to_element("group");
        let members: Vec<_> = element
            .children
            .iter()
            .filter(|c| c.tag == "member")
            .map(|c| c.text.clone().unwrap())
            .collect();
        assert_eq!(members, vec!["2000", "2001"]);

        // An empty list writes no children at all.
        record.insert("member", Vec::<Value>::new());
        assert!(record.to_element("group").child("member").is_none());
    }

    #[test]
    fn attribute_only_leaf_is_a_record() {
        let element = Element::parse(r#"<interface enable="yes"/>"#).unwrap();
        let record = Value::from_element(&element).into_record().unwrap();
        assert_eq!(record.get_str("enable"), Some("yes"));
        assert_eq!(record.to_element("interface"), element);
    }

    #[test]
    fn leaf_with_attributes_keeps_text() {
        let element = Element::parse(r#"<priv level="admin">page-all</priv>"#).unwrap();
        let value = Value::from_element(&element);
        let record = value.as_record().unwrap();
        assert_eq!(record.get_str("level"), Some("admin"));
        assert_eq!(record.text(), Some("page-all"));
        assert_eq!(value.as_str(), Some("page-all"));
        assert_eq!(record.to_element("priv"), element);

        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r##"{"level":"admin","#text":"page-all"}"##
        );

        // Inside a user, the field still reads as its text.
        let user = Element::parse(r#"<user><priv level="admin">page-all</priv></user>"#).unwrap();
        let record = Value::from_element(&user).into_record().unwrap();
        assert_eq!(record.get_str("priv"), Some("page-all"));
        assert_eq!(record.scalars("priv"), vec!["page-all"]);
        assert_eq!(record.to_element("user"), user);
    }

    #[test]
    fn remove_keeps_order() {
        let mut record: Record = vec![("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(record.remove("b"), Some(Value::from("2")));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(record.remove("b"), None);
    }

    #[test]
    fn serializes_like_json_document() {
        let mut record = Record::new();
        record.insert("name", "bob");
        record.insert("disabled", Value::Absent);
        record.insert("member", vec![Value::from("1"), Value::from("2")]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"name":"bob","disabled":null,"member":["1","2"]}"#
        );
    }
}
