//! Container to/from a structured key→payload tree.
//!
//! A container is written under the [`COMPONENTS_KEY`] root entry as a map
//! from component id to that component's own tag:
//!
//! ```text
//! { "components": { "arcana:mana": { "amount": 100 }, "stamina": { ... } } }
//! ```
//!
//! Reading also accepts the legacy layout, a list of records each naming its
//! component with a [`LEGACY_ID_KEY`] field next to the payload fields:
//!
//! ```text
//! { "components": [ { "componentId": "arcana:mana", "amount": 100 } ] }
//! ```
//!
//! Only components with the serializable capability are written or read.
//! Entries that cannot be matched to a slot are skipped with a warning.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::container::ComponentContainer;
use crate::diagnostics::WarnOnce;
use crate::error::TagError;
use crate::key::ComponentId;
use crate::registry::ComponentRegistry;

/// Structured key→payload tree.
pub type Tag = serde_json::Map<String, Value>;

/// Root entry holding a container's components.
pub const COMPONENTS_KEY: &str = "components";

/// Id field of a legacy list record.
pub const LEGACY_ID_KEY: &str = "componentId";

/// Field used by [`write_serde`] when a type does not serialize to a map.
pub const VALUE_KEY: &str = "value";

/// Serializes every present serializable component of `container`.
///
/// Returns `None` when nothing would be written.
#[must_use]
pub fn write_components<C: ComponentContainer + ?Sized>(container: &C) -> Option<Tag> {
    if container.is_empty() {
        return None;
    }

    let mut components = Tag::new();
    for key in container.keys() {
        let Some(serializable) = container.get_raw(key).and_then(|c| c.as_serializable()) else {
            continue;
        };
        let mut payload = Tag::new();
        serializable.write_to_tag(&mut payload);
        components.insert(key.id().to_string(), Value::Object(payload));
    }

    (!components.is_empty()).then_some(components)
}

/// Writes `container` into `tag` under [`COMPONENTS_KEY`].
///
/// Leaves `tag` untouched when there is nothing to write.
pub fn to_tag<C: ComponentContainer + ?Sized>(container: &C, tag: &mut Tag) {
    if let Some(components) = write_components(container) {
        tag.insert(COMPONENTS_KEY.to_owned(), Value::Object(components));
    }
}

/// Reads the [`COMPONENTS_KEY`] entry of `tag` into `container`.
///
/// Returns the number of components updated. Unknown ids, invalid ids, ids
/// without a slot in `container` and malformed payloads are skipped, warning
/// at most once per id through `warnings`.
pub fn from_tag<C: ComponentContainer + ?Sized>(
    container: &mut C,
    registry: &ComponentRegistry,
    tag: &Tag,
    warnings: &WarnOnce,
) -> usize {
    match tag.get(COMPONENTS_KEY) {
        Some(Value::Object(components)) => read_components(container, registry, components, warnings),
        Some(Value::Array(records)) => read_legacy(container, registry, records, warnings),
        Some(other) => {
            warn!(kind = value_kind(other), "ignoring malformed components entry");
            0
        }
        None => 0,
    }
}

/// Reads a component map (the current layout) into `container`.
pub fn read_components<C: ComponentContainer + ?Sized>(
    container: &mut C,
    registry: &ComponentRegistry,
    components: &Tag,
    warnings: &WarnOnce,
) -> usize {
    let mut applied = 0;
    for (id, payload) in components {
        let Value::Object(payload) = payload else {
            warnings.warn(id, "payload is not a map");
            continue;
        };
        if apply_entry(container, registry, id, payload, warnings) {
            applied += 1;
        }
    }
    applied
}

fn read_legacy<C: ComponentContainer + ?Sized>(
    container: &mut C,
    registry: &ComponentRegistry,
    records: &[Value],
    warnings: &WarnOnce,
) -> usize {
    let mut applied = 0;
    for record in records {
        let Some(record) = record.as_object() else {
            warn!(kind = value_kind(record), "ignoring malformed legacy component record");
            continue;
        };
        let Some(id) = record.get(LEGACY_ID_KEY).and_then(Value::as_str) else {
            warn!("ignoring legacy component record without an id");
            continue;
        };
        if apply_entry(container, registry, id, record, warnings) {
            applied += 1;
        }
    }
    applied
}

fn apply_entry<C: ComponentContainer + ?Sized>(
    container: &mut C,
    registry: &ComponentRegistry,
    id: &str,
    payload: &Tag,
    warnings: &WarnOnce,
) -> bool {
    if !ComponentId::is_valid(id) {
        warnings.warn(id, "invalid component id");
        return false;
    }
    let Some(key) = registry.lookup(id) else {
        warnings.warn(id, "unregistered component id");
        return false;
    };
    let Some(component) = container.get_raw_mut(key) else {
        warnings.warn(id, "no component slot on this owner");
        return false;
    };
    let Some(serializable) = component.as_serializable_mut() else {
        return false;
    };

    match serializable.read_from_tag(payload) {
        Ok(()) => true,
        Err(err) => {
            warn!(id, error = %err, "failed to read component tag");
            false
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Writes `value` into `tag` through serde.
///
/// Map-like values are merged into `tag`; anything else is stored under
/// [`VALUE_KEY`].
pub fn write_serde<T: Serialize>(value: &T, tag: &mut Tag) {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => tag.extend(fields),
        Ok(other) => {
            tag.insert(VALUE_KEY.to_owned(), other);
        }
        Err(err) => warn!(
            component = std::any::type_name::<T>(),
            error = %err,
            "failed to serialize component"
        ),
    }
}

/// Replaces `target` with the value described by `tag`, through serde.
///
/// # Errors
///
/// Returns [`TagError::Value`] if `tag` does not deserialize into `T`.
pub fn read_serde<T: DeserializeOwned>(target: &mut T, tag: &Tag) -> Result<(), TagError> {
    let as_map = serde_json::from_value::<T>(Value::Object(tag.clone()));
    *target = match (as_map, tag.get(VALUE_KEY)) {
        (Ok(value), _) => value,
        (Err(_), Some(inner)) if tag.len() == 1 => serde_json::from_value(inner.clone())?,
        (Err(err), _) => return Err(err.into()),
    };
    Ok(())
}

/// Implements [`TagSerializable`](crate::TagSerializable) through serde.
#[macro_export]
macro_rules! impl_serde_tag {
    ($ty:ty) => {
        impl $crate::TagSerializable for $ty {
            fn write_to_tag(&self, tag: &mut $crate::Tag) {
                $crate::tag::write_serde(self, tag);
            }

            fn read_from_tag(&mut self, tag: &$crate::Tag) -> ::core::result::Result<(), $crate::TagError> {
                $crate::tag::read_serde(self, tag)
            }
        }
    };
}
