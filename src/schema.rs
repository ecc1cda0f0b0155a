//! Declarative JSON schemas and the validator that enforces them
//!
//! A [`Schema`] describes the shape a JSON value must have. Validation walks the value and the
//! schema side by side and collects every [`Violation`] it finds, so a client that sends a body
//! with three problems hears about all three in one response.
//!
//! Validation also normalizes: undeclared object keys are stripped, kept or rejected according
//! to the object's [`UnknownKeys`] policy, and the normalized value is what gets handed on.
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// A descriptor for the accepted shape of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any value at all.
    Any,
    Null,
    Bool,
    String,
    /// Any JSON number, integral or not.
    Number,
    /// An integral number, optionally bounded below.
    Integer { minimum: Option<i64> },
    /// A string equal to exactly this value.
    Literal(String),
    /// A string equal to one of these values.
    OneOf(Vec<String>),
    Array(Box<Schema>),
    Object(ObjectSchema),
    /// Either `null` or a value matching the inner schema.
    Nullable(Box<Schema>),
}

/// What to do with object keys the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Drop them from the normalized value.
    #[default]
    Strip,
    /// Report each one as a violation.
    Reject,
    /// Keep them untouched.
    Passthrough,
}

/// The fields of an object schema, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
    unknown_keys: UnknownKeys,
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: String,
    schema: Schema,
    required: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema,
            required: false,
        });
        self
    }

    pub fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Shorthand for rejecting undeclared keys.
    pub fn strict(self) -> Self {
        self.unknown_keys(UnknownKeys::Reject)
    }

    fn rejecting_unknown_keys(self) -> Self {
        let unknown_keys = match self.unknown_keys {
            UnknownKeys::Strip => UnknownKeys::Reject,
            policy => policy,
        };
        Self {
            fields: self
                .fields
                .into_iter()
                .map(|field| Field {
                    schema: field.schema.rejecting_unknown_keys(),
                    ..field
                })
                .collect(),
            unknown_keys,
        }
    }

    fn declares(&self, key: &str) -> bool {
        self.fields.iter().any(|field| field.name == key)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        Schema::Object(object)
    }
}

impl Schema {
    pub fn literal(value: impl Into<String>) -> Self {
        Schema::Literal(value.into())
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn array(item: Schema) -> Self {
        Schema::Array(Box::new(item))
    }

    pub fn nullable(inner: Schema) -> Self {
        Schema::Nullable(Box::new(inner))
    }

    pub fn integer() -> Self {
        Schema::Integer { minimum: None }
    }

    pub fn integer_at_least(minimum: i64) -> Self {
        Schema::Integer {
            minimum: Some(minimum),
        }
    }

    /// The same schema with every object that would strip undeclared keys rejecting them instead.
    ///
    /// Objects that explicitly pass unknown keys through keep doing so.
    pub fn rejecting_unknown_keys(self) -> Self {
        match self {
            Schema::Array(item) => Schema::Array(Box::new(item.rejecting_unknown_keys())),
            Schema::Nullable(inner) => Schema::Nullable(Box::new(inner.rejecting_unknown_keys())),
            Schema::Object(object) => Schema::Object(object.rejecting_unknown_keys()),
            other => other,
        }
    }

    /// Validates `value`, returning the normalized value or every violation found.
    pub fn validate(&self, value: &Value) -> Result<Value, Violations> {
        let mut violations = Vec::new();
        let mut path = Vec::new();
        let normalized = self.check(value, &mut path, &mut violations);
        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(Violations(violations))
        }
    }

    /// Validates `value` and deserializes the normalized result into `T`.
    ///
    /// If the schema accepts the value but `T` cannot be built from it, the schema and the type
    /// disagree; that mismatch is reported as an `invalid_shape` violation at the root.
    pub fn parse<T: DeserializeOwned>(&self, value: &Value) -> Result<T, Violations> {
        let normalized = self.validate(value)?;
        serde_json::from_value(normalized).map_err(|e| {
            Violations::single(Violation::new(
                Vec::new(),
                ViolationCode::InvalidShape,
                self.describe(),
                json_type(value).to_string(),
                format!("Value does not fit the declared type: {}", e),
            ))
        })
    }

    /// A short human-readable name for what this schema accepts.
    pub fn describe(&self) -> String {
        match self {
            Schema::Any => "any".into(),
            Schema::Null => "null".into(),
            Schema::Bool => "boolean".into(),
            Schema::String => "string".into(),
            Schema::Number => "number".into(),
            Schema::Integer { minimum: None } => "integer".into(),
            Schema::Integer { minimum: Some(min) } => format!("integer >= {}", min),
            Schema::Literal(literal) => format!("{:?}", literal),
            Schema::OneOf(options) => {
                let quoted: Vec<String> = options.iter().map(|o| format!("{:?}", o)).collect();
                format!("one of {}", quoted.join(", "))
            }
            Schema::Array(item) => format!("array of {}", item.describe()),
            Schema::Object(_) => "object".into(),
            Schema::Nullable(inner) => format!("{} or null", inner.describe()),
        }
    }

    fn check(&self, value: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<Violation>) -> Value {
        match (self, value) {
            (Schema::Any, _) => value.clone(),
            (Schema::Null, Value::Null)
            | (Schema::Bool, Value::Bool(_))
            | (Schema::String, Value::String(_))
            | (Schema::Number, Value::Number(_)) => value.clone(),
            (Schema::Nullable(_), Value::Null) => Value::Null,
            (Schema::Nullable(inner), _) => {
                let start = out.len();
                let checked = inner.check(value, path, out);
                // A top-level mismatch is reported against the nullable type, not the inner one.
                for violation in &mut out[start..] {
                    if violation.code == ViolationCode::InvalidType && violation.path == *path {
                        *violation = self.type_mismatch(path, value);
                    }
                }
                checked
            }
            (Schema::Integer { minimum }, Value::Number(n)) => {
                if !(n.is_i64() || n.is_u64()) {
                    out.push(self.type_mismatch(path, value));
                } else if let (Some(min), Some(actual)) = (minimum, n.as_i64()) {
                    if actual < *min {
                        out.push(Violation::new(
                            path.clone(),
                            ViolationCode::TooSmall,
                            self.describe(),
                            actual.to_string(),
                            format!(
                                "Expected {} at `{}`, received {}",
                                self.describe(),
                                format_path(path),
                                actual
                            ),
                        ));
                    }
                }
                value.clone()
            }
            (Schema::Literal(expected), Value::String(actual)) => {
                if actual != expected {
                    out.push(self.literal_mismatch(path, actual));
                }
                value.clone()
            }
            (Schema::OneOf(options), Value::String(actual)) => {
                if !options.iter().any(|option| option == actual) {
                    out.push(self.literal_mismatch(path, actual));
                }
                value.clone()
            }
            (Schema::Array(item), Value::Array(items)) => {
                let normalized = items
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        path.push(PathSegment::Index(index));
                        let checked = item.check(element, path, out);
                        path.pop();
                        checked
                    })
                    .collect();
                Value::Array(normalized)
            }
            (Schema::Object(object), Value::Object(map)) => object.check(map, path, out),
            _ => {
                out.push(self.type_mismatch(path, value));
                value.clone()
            }
        }
    }

    fn type_mismatch(&self, path: &[PathSegment], value: &Value) -> Violation {
        Violation::new(
            path.to_vec(),
            ViolationCode::InvalidType,
            self.describe(),
            json_type(value).to_string(),
            format!(
                "Expected {} at `{}`, received {}",
                self.describe(),
                format_path(path),
                json_type(value)
            ),
        )
    }

    fn literal_mismatch(&self, path: &[PathSegment], actual: &str) -> Violation {
        Violation::new(
            path.to_vec(),
            ViolationCode::InvalidLiteral,
            self.describe(),
            format!("{:?}", actual),
            format!(
                "Expected {} at `{}`, received {:?}",
                self.describe(),
                format_path(path),
                actual
            ),
        )
    }
}

impl ObjectSchema {
    fn check(
        &self,
        map: &Map<String, Value>,
        path: &mut Vec<PathSegment>,
        out: &mut Vec<Violation>,
    ) -> Value {
        let mut normalized = Map::new();

        for field in &self.fields {
            path.push(PathSegment::Key(field.name.clone()));
            match map.get(&field.name) {
                Some(value) => {
                    let checked = field.schema.check(value, path, out);
                    normalized.insert(field.name.clone(), checked);
                }
                None if field.required => out.push(Violation::new(
                    path.clone(),
                    ViolationCode::Missing,
                    field.schema.describe(),
                    "missing".into(),
                    format!(
                        "Required field `{}` is missing (expected {})",
                        format_path(path),
                        field.schema.describe()
                    ),
                )),
                None => {}
            }
            path.pop();
        }

        for (key, value) in map.iter().filter(|(key, _)| !self.declares(key)) {
            match self.unknown_keys {
                UnknownKeys::Strip => {}
                UnknownKeys::Passthrough => {
                    normalized.insert(key.clone(), value.clone());
                }
                UnknownKeys::Reject => {
                    path.push(PathSegment::Key(key.clone()));
                    out.push(Violation::new(
                        path.clone(),
                        ViolationCode::UnrecognizedKey,
                        "no such key".into(),
                        json_type(value).to_string(),
                        format!("Unrecognized key `{}`", format_path(path)),
                    ));
                    path.pop();
                }
            }
        }

        Value::Object(normalized)
    }
}

/// Types that declare the schema their JSON form must satisfy.
pub trait Shape {
    fn schema() -> Schema;
}

/// One step into a JSON document: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Missing,
    InvalidType,
    InvalidLiteral,
    TooSmall,
    UnrecognizedKey,
    InvalidShape,
}

/// A single place where a value failed its schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Location of the offending value, e.g. `["messages", 0, "role"]`.
    pub path: Vec<PathSegment>,
    pub code: ViolationCode,
    pub expected: String,
    pub received: String,
    pub message: String,
}

impl Violation {
    fn new(
        path: Vec<PathSegment>,
        code: ViolationCode,
        expected: String,
        received: String,
        message: String,
    ) -> Self {
        Self {
            path,
            code,
            expected,
            received,
            message,
        }
    }

    /// The path in dotted form, e.g. `messages[0].role`.
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Every violation found while validating one value. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    fn single(violation: Violation) -> Self {
        Self(vec![violation])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted paths of all violations, in the order they were found.
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(Violation::path_string).collect()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|v| v.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for Violations {}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn format_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "<root>".into();
    }
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) if is_plain_key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Key(key) => out.push_str(&format!("[{:?}]", key)),
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

/// Keys that read unambiguously in dotted form.
fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
