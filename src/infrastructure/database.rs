// Database Interface - generic keyed document store
// Components talk to named collections through this trait; filtering and
// ordering are expressed with the small query model below.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::core::strong_types::DocId;
use crate::error::AppResult;

/// Raw document body: a JSON object
pub type Document = Map<String, Value>;

/// Pseudo-field addressing the document id in filters
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub created_time: i64,
    pub updated_time: i64,
    /// Bumped by every write; conditional writes compare against it
    pub version: i64,
    pub data: Document,
}

impl StoredDocument {
    fn field(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            Some(Value::from(self.id))
        } else {
            self.data.get(name).cloned()
        }
    }
}

/// A single comparison against one field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Field value is one of the listed values
    In(Vec<Value>),
    /// Field is an array holding the value
    Contains(Value),
}

impl Predicate {
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(expected) => field.is_some_and(|v| values_equal(v, expected)),
            Predicate::Ne(expected) => !field.is_some_and(|v| values_equal(v, expected)),
            Predicate::Gt(bound) => compare(field, bound) == Some(Ordering::Greater),
            Predicate::Gte(bound) => matches!(
                compare(field, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Lt(bound) => compare(field, bound) == Some(Ordering::Less),
            Predicate::Lte(bound) => {
                matches!(compare(field, bound), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::In(options) => {
                field.is_some_and(|v| options.iter().any(|o| values_equal(v, o)))
            }
            Predicate::Contains(member) => match field {
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, member)),
                _ => false,
            },
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Ordering between a field and a bound of the same JSON kind; `None` when
/// the field is missing or the kinds differ
fn compare(field: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match (field?, bound) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Conjunction of field predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Predicate)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocId) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    pub fn with(mut self, field: &str, predicate: Predicate) -> Self {
        self.clauses.push((field.to_string(), predicate));
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Eq(value.into()))
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Ne(value.into()))
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Gt(value.into()))
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Gte(value.into()))
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Lt(value.into()))
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Lte(value.into()))
    }

    pub fn one_of<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.with(field, Predicate::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Predicate::Contains(value.into()))
    }

    /// The id this filter pins with an `_id` equality, if any
    pub fn pinned_id(&self) -> Option<DocId> {
        self.clauses.iter().find_map(|(field, predicate)| match predicate {
            Predicate::Eq(value) if field == ID_FIELD => {
                serde_json::from_value::<DocId>(value.clone()).ok()
            }
            _ => None,
        })
    }

    pub fn matches(&self, doc: &StoredDocument) -> bool {
        self.clauses
            .iter()
            .all(|(field, predicate)| predicate.matches(doc.field(field).as_ref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Insertion order (ids are time ordered)
    #[default]
    Inserted,
    /// Most recently updated first
    RecentlyUpdated,
}

/// Document store interface consumed by every component
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, id: DocId, data: Document) -> AppResult<()>;

    async fn read_one(&self, collection: &str, filter: &Filter)
        -> AppResult<Option<StoredDocument>>;

    async fn read_many(
        &self,
        collection: &str,
        filter: &Filter,
        order: SortOrder,
    ) -> AppResult<Vec<StoredDocument>>;

    /// Merge `patch` into the first matching document. Returns false when nothing matched.
    async fn update_one(&self, collection: &str, filter: &Filter, patch: Document)
        -> AppResult<bool>;

    /// Merge `patch` into document `id` only while it still carries `version`.
    /// Returns false when the document changed or vanished since it was read.
    async fn update_if_version(
        &self,
        collection: &str,
        id: DocId,
        version: i64,
        patch: Document,
    ) -> AppResult<bool>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> AppResult<bool>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> AppResult<u64>;
}
