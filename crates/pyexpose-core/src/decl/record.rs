//! Raw introspection records.
//!
//! The introspection table maps declaration identifiers to tagged records.
//! Records reference each other only by identifier; [`DeclGraph::link`]
//! resolves those identifiers into arena ids.
//!
//! The JSON form is a single object keyed by identifier. Document order is
//! preserved because member lists are rebuilt in that order.
//!
//! ```json
//! {
//!   "_1": { "kind": "Namespace", "name": "::" },
//!   "_2": { "kind": "FundamentalType", "name": "int", "size": 32 },
//!   "_3": { "kind": "Function", "name": "twice", "returns": "_2", "context": "_1",
//!           "arguments": [ { "type": "_2", "name": "x" } ] }
//! }
//! ```
//!
//! [`DeclGraph::link`]: super::DeclGraph::link

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Access;

/// A parameter as it appears in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

/// An inheritance edge as it appears in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub bases: Vec<BaseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub returns: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub arguments: Vec<ArgumentRecord>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub throw: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub returns: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub arguments: Vec<ArgumentRecord>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default, rename = "const")]
    pub is_const: bool,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub pure_virtual: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub throw: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// One tagged record of the introspection table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Record {
    Namespace {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        context: Option<String>,
    },
    Class(ClassRecord),
    Struct(ClassRecord),
    Union {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        size: Option<u64>,
    },
    Enumeration {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        size: Option<u64>,
    },
    FundamentalType {
        name: String,
        #[serde(default)]
        size: Option<u64>,
    },
    PointerType {
        #[serde(rename = "type")]
        ty: String,
    },
    ReferenceType {
        #[serde(rename = "type")]
        ty: String,
    },
    CvQualifiedType {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default, rename = "const")]
        is_const: bool,
        #[serde(default, rename = "volatile")]
        is_volatile: bool,
        #[serde(default, rename = "restrict")]
        is_restrict: bool,
    },
    ArrayType {
        #[serde(rename = "type")]
        ty: String,
        /// Highest valid index; absent for arrays of unknown bound.
        #[serde(default)]
        max: Option<u64>,
    },
    FunctionType {
        returns: String,
        #[serde(default)]
        arguments: Vec<ArgumentRecord>,
        #[serde(default)]
        variadic: bool,
    },
    MethodType {
        basetype: String,
        returns: String,
        #[serde(default)]
        arguments: Vec<ArgumentRecord>,
        #[serde(default)]
        variadic: bool,
        #[serde(default, rename = "const")]
        is_const: bool,
    },
    OffsetType {
        basetype: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Typedef {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        context: Option<String>,
    },
    Field {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        access: Access,
        #[serde(default)]
        offset: u64,
        #[serde(default, rename = "static")]
        is_static: bool,
    },
    Function(FunctionRecord),
    OperatorFunction(FunctionRecord),
    Method(MethodRecord),
    OperatorMethod(MethodRecord),
    Constructor {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        access: Access,
        #[serde(default)]
        arguments: Vec<ArgumentRecord>,
        #[serde(default)]
        variadic: bool,
        #[serde(default)]
        artificial: bool,
    },
    Destructor {
        name: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        access: Access,
        #[serde(default, rename = "virtual")]
        is_virtual: bool,
        #[serde(default)]
        artificial: bool,
    },
    Variable {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        init: Option<String>,
    },
    Unimplemented,
}

impl Record {
    /// Identifier of the enclosing namespace or class, if recorded.
    pub fn context(&self) -> Option<&str> {
        match self {
            Record::Namespace { context, .. }
            | Record::Union { context, .. }
            | Record::Enumeration { context, .. }
            | Record::Typedef { context, .. }
            | Record::Field { context, .. }
            | Record::Constructor { context, .. }
            | Record::Destructor { context, .. }
            | Record::Variable { context, .. } => context.as_deref(),
            Record::Class(c) | Record::Struct(c) => c.context.as_deref(),
            Record::Function(f) | Record::OperatorFunction(f) => f.context.as_deref(),
            Record::Method(m) | Record::OperatorMethod(m) => m.context.as_deref(),
            Record::FundamentalType { .. }
            | Record::PointerType { .. }
            | Record::ReferenceType { .. }
            | Record::CvQualifiedType { .. }
            | Record::ArrayType { .. }
            | Record::FunctionType { .. }
            | Record::MethodType { .. }
            | Record::OffsetType { .. }
            | Record::Unimplemented => None,
        }
    }

    /// Whether the record is a class member that must name its class.
    pub fn requires_context(&self) -> bool {
        matches!(
            self,
            Record::Field { .. }
                | Record::Method(_)
                | Record::OperatorMethod(_)
                | Record::Constructor { .. }
                | Record::Destructor { .. }
        )
    }
}

// ============================================================================
// Table
// ============================================================================

/// Identifier-to-record table in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntrospectionTable {
    entries: Vec<(String, Record)>,
}

impl IntrospectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Identifiers are expected to be unique.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) {
        self.entries.push((key.into(), record));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }
}

impl Serialize for IntrospectionTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, record) in &self.entries {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

struct TableVisitor;

impl<'de> Visitor<'de> for TableVisitor {
    type Value = IntrospectionTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from declaration identifier to record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut seen = HashSet::new();
        let mut table = IntrospectionTable::new();
        while let Some((key, record)) = access.next_entry::<String, Record>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format!(
                    "duplicate declaration identifier \"{key}\""
                )));
            }
            table.insert(key, record);
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for IntrospectionTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_preserves_document_order() {
        let json = r#"{
            "_10": { "kind": "Namespace", "name": "::" },
            "_2": { "kind": "FundamentalType", "name": "int", "size": 32 },
            "_1": { "kind": "PointerType", "type": "_2" }
        }"#;
        let table: IntrospectionTable = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["_10", "_2", "_1"]);
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let json = r#"{
            "_1": { "kind": "Unimplemented" },
            "_1": { "kind": "Unimplemented" }
        }"#;
        let err = serde_json::from_str::<IntrospectionTable>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate declaration identifier"));
    }

    #[test]
    fn method_flags_use_keyword_attribute_names() {
        let json = r#"{ "kind": "Method", "name": "area", "returns": "_3",
                        "context": "_4", "access": "protected",
                        "const": true, "virtual": true }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        match record {
            Record::Method(m) => {
                assert!(m.is_const);
                assert!(m.is_virtual);
                assert!(!m.is_static);
                assert_eq!(m.access, Access::Protected);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }
}
