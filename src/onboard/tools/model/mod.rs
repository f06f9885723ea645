use std::fmt;

use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use crate::onboard::tools::error::{Result, ToolError};

/// Type of the single entity that roots a building document.
pub const BUILDING_TYPE: &str = "FACILITIES/BUILDING";
/// Type forced onto translated entities that are onboarded as new virtual entities.
pub const PASSTHROUGH_TYPE: &str = "GATEWAYS/PASSTHROUGH";
/// Synthetic first entry of every emitted config bundle.
pub const CONFIG_METADATA: &str = "CONFIG_METADATA";
/// Marker for a standard field that exists but has no raw source yet.
pub const MISSING: &str = "MISSING";
/// Etag written when the building document carries none for an entity.
pub const MISSING_ETAG: &str = "MISSING ETAG";

/// Entity field names recognised by the transforms.
pub mod field {
    pub const TYPE: &str = "type";
    pub const ETAG: &str = "etag";
    pub const CODE: &str = "code";
    pub const TRANSLATION: &str = "translation";
    pub const LINKS: &str = "links";
    pub const OPERATION: &str = "operation";
    pub const UPDATE_MASK: &str = "update_mask";
    pub const PRESENT_VALUE: &str = "present_value";
}

/// Opaque identifier of an entity inside a document.
pub type EntityId = String;

/// Field name → value mapping describing one entity. Field order is kept as read.
pub type Entity = Mapping;

/// Ordered identifier → entity mapping as read from a building or change
/// export. Iteration follows first-insertion order; replacing an entity keeps
/// its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    entities: Mapping,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a parsed YAML value and converts it into a document.
    ///
    /// The top level must be a mapping whose keys are scalars and whose values
    /// are mappings. A `null` entity body is read as an empty entity.
    pub fn from_value(value: Value) -> Result<Self> {
        let mapping = match value {
            Value::Null => return Ok(Self::new()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(ToolError::InvalidDocument(format!(
                    "expected a mapping of identifiers to entities, found {}",
                    kind_name(&other)
                )));
            }
        };

        let mut document = Self::new();
        for (key, value) in mapping {
            let id = key_to_id(&key)?;
            let entity = match value {
                Value::Mapping(entity) => entity,
                Value::Null => Mapping::new(),
                other => {
                    return Err(ToolError::InvalidDocument(format!(
                        "entity '{id}' must be a mapping, found {}",
                        kind_name(&other)
                    )));
                }
            };
            document.insert(id, entity);
        }
        Ok(document)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id).and_then(Value::as_mapping)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id).and_then(Value::as_mapping_mut)
    }

    /// Inserts or replaces an entity, returning the previous one if any.
    pub fn insert(&mut self, id: impl Into<EntityId>, entity: Entity) -> Option<Entity> {
        match self
            .entities
            .insert(Value::String(id.into()), Value::Mapping(entity))
        {
            Some(Value::Mapping(previous)) => Some(previous),
            _ => None,
        }
    }

    /// Iterates over `(identifier, entity)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entities
            .iter()
            .filter_map(|(key, value)| Some((key.as_str()?, value.as_mapping()?)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(id, _)| id)
    }

    /// Finds the single entity typed [`BUILDING_TYPE`].
    pub fn building_root(&self) -> Result<(&str, &Entity)> {
        let mut roots = self
            .iter()
            .filter(|(_, entity)| text_field(entity, field::TYPE) == Some(BUILDING_TYPE));
        let first = roots.next().ok_or(ToolError::MissingBuildingRoot)?;
        let rest: Vec<&str> = roots.map(|(id, _)| id).collect();
        if rest.is_empty() {
            Ok(first)
        } else {
            let mut ids = vec![first.0.to_string()];
            ids.extend(rest.into_iter().map(str::to_string));
            Err(ToolError::MultipleBuildingRoots(ids))
        }
    }
}

impl FromIterator<(EntityId, Entity)> for Document {
    fn from_iter<T: IntoIterator<Item = (EntityId, Entity)>>(iter: T) -> Self {
        let mut document = Self::new();
        for (id, entity) in iter {
            document.insert(id, entity);
        }
        document
    }
}

fn key_to_id(key: &Value) -> Result<EntityId> {
    match key {
        Value::String(id) => Ok(id.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(ToolError::InvalidDocument(format!(
            "entity identifiers must be scalars, found {}",
            kind_name(other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Operation directive carried by change entries and config metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
}

impl Operation {
    /// Parses an operation name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("add") {
            Some(Operation::Add)
        } else if name.eq_ignore_ascii_case("update") {
            Some(Operation::Update)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Add => "ADD",
            Operation::Update => "UPDATE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw source behind a standard field in a reporting entity's translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Field marked with the [`MISSING`] sentinel.
    Missing,
    /// Field bound to a device point through its `present_value`.
    Present(String),
    /// Field or reporting entity could not be found.
    Unresolved,
}

impl RawValue {
    /// Classifies a single translation entry.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(text) if text == MISSING => RawValue::Missing,
            Value::Mapping(descriptor) => descriptor
                .get(field::PRESENT_VALUE)
                .filter(|value| is_truthy(value))
                .map(|value| RawValue::Present(scalar_text(value)))
                .unwrap_or(RawValue::Unresolved),
            _ => RawValue::Unresolved,
        }
    }

    /// Looks up `field_name` in the translation of `entity`.
    pub fn of_field(entity: Option<&Entity>, field_name: &str) -> Self {
        entity
            .and_then(translation)
            .and_then(|translation| translation.get(field_name))
            .map(RawValue::classify)
            .unwrap_or(RawValue::Unresolved)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Missing => f.write_str(MISSING),
            RawValue::Present(value) => f.write_str(value),
            RawValue::Unresolved => Ok(()),
        }
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Mirrors the truthiness rules of the exports: null, `false`, zero, and empty
/// strings or collections count as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(mapping) => !mapping.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

/// Returns true when the entity carries a non-empty value under `name`.
pub fn has_field(entity: &Entity, name: &str) -> bool {
    entity.get(name).is_some_and(is_truthy)
}

pub fn text_field<'a>(entity: &'a Entity, name: &str) -> Option<&'a str> {
    entity.get(name).and_then(Value::as_str)
}

pub fn translation(entity: &Entity) -> Option<&Mapping> {
    entity
        .get(field::TRANSLATION)
        .filter(|value| is_truthy(value))
        .and_then(Value::as_mapping)
}

pub fn links(entity: &Entity) -> Option<&Mapping> {
    entity
        .get(field::LINKS)
        .filter(|value| is_truthy(value))
        .and_then(Value::as_mapping)
}

pub fn operation(entity: &Entity) -> Option<Operation> {
    text_field(entity, field::OPERATION).and_then(Operation::parse)
}

/// Human readable code of the entity, if any.
pub fn code(entity: &Entity) -> Option<&str> {
    text_field(entity, field::CODE)
}

/// Building code prefix of an entity code (`US-MTV-1:AHU-1` → `US-MTV-1`).
pub fn building_code(code: &str) -> &str {
    code.split(':').next().unwrap_or(code)
}

/// Stringifies an etag so it is compared and written as an opaque token.
pub fn etag_token(value: &Value) -> String {
    scalar_text(value)
}

/// Stringified etag of the entity, absent when missing or empty.
pub fn entity_etag(entity: &Entity) -> Option<String> {
    entity
        .get(field::ETAG)
        .filter(|value| is_truthy(value))
        .map(etag_token)
}

pub fn set_field(entity: &mut Entity, name: &str, value: impl Into<Value>) {
    entity.insert(Value::from(name), value.into());
}

/// Builds a YAML sequence of field names, e.g. an `update_mask`.
pub fn field_list(names: &[&str]) -> Value {
    Value::Sequence(names.iter().map(|name| Value::from(*name)).collect())
}

/// Config metadata entity announcing the bundle's operation.
pub fn config_metadata(operation: Operation) -> Entity {
    let mut metadata = Entity::new();
    set_field(&mut metadata, field::OPERATION, operation.as_str());
    metadata
}

/// Text form of a scalar key or value; non-scalars are rendered as inline YAML.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}
