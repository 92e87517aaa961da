//! Entity ↔ record conversion
//!
//! The default [`ReflectConverter`] copies fields by name through serde, so any pair of
//! plain structs works without per-type code. Types on a hot path can implement
//! [`Converter`] by hand and hand it to the store instead.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// Bidirectional mapping between a domain entity `E` and its record `R`
pub trait Converter<E, R>: Send + Sync {
    fn to_record(&self, entity: &E) -> R;

    fn to_entity(&self, record: &R) -> E;

    fn to_many_records(&self, entities: &[E]) -> Vec<R> {
        to_many(entities, |entity| self.to_record(entity))
    }

    fn to_many_entities(&self, records: &[R]) -> Vec<E> {
        to_many(records, |record| self.to_entity(record))
    }
}

/// Map every item in order. Empty in, empty out.
pub fn to_many<S, T>(items: &[S], f: impl Fn(&S) -> T) -> Vec<T> {
    items.iter().map(f).collect()
}

/// Serde-driven field-by-field copy.
///
/// Fields are matched by their serialised name. Source fields the target does not know
/// are ignored; target fields the source does not have keep their `Default` value. A
/// field whose value the target cannot accept (type mismatch) is left at its default
/// and reported through `tracing`. Conversion itself never fails.
pub struct ReflectConverter<E, R> {
    _phantom: PhantomData<fn(&E) -> R>,
}

impl<E, R> ReflectConverter<E, R> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<E, R> Default for ReflectConverter<E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, R> Clone for ReflectConverter<E, R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E, R> fmt::Debug for ReflectConverter<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectConverter")
            .field("entity", &std::any::type_name::<E>())
            .field("record", &std::any::type_name::<R>())
            .finish()
    }
}

impl<E, R> Converter<E, R> for ReflectConverter<E, R>
where
    E: Serialize + DeserializeOwned + Default,
    R: Serialize + DeserializeOwned + Default,
{
    fn to_record(&self, entity: &E) -> R {
        copy_fields(entity)
    }

    fn to_entity(&self, record: &R) -> E {
        copy_fields(record)
    }
}

/// For stores whose entity type is its own record
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl<T: Clone> Converter<T, T> for IdentityConverter {
    fn to_record(&self, entity: &T) -> T {
        entity.clone()
    }

    fn to_entity(&self, record: &T) -> T {
        record.clone()
    }
}

fn as_object<T: Serialize>(value: &T) -> Option<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

/// Build a `T` from the same-named fields of `source`
pub fn copy_fields<S, T>(source: &S) -> T
where
    S: Serialize,
    T: Serialize + DeserializeOwned + Default,
{
    let (Some(source_fields), Some(mut target_fields)) = (as_object(source), as_object(&T::default()))
    else {
        tracing::warn!(
            source = std::any::type_name::<S>(),
            target = std::any::type_name::<T>(),
            "conversion needs struct-shaped types; returning default"
        );
        return T::default();
    };

    let mut merged = target_fields.clone();
    merged.extend(source_fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Ok(target) = serde_json::from_value(Value::Object(merged)) {
        return target;
    }

    // Some field does not fit: carry fields over one at a time and keep the ones that do
    for (field, value) in source_fields {
        let previous = target_fields.insert(field.clone(), value);
        if serde_json::from_value::<T>(Value::Object(target_fields.clone())).is_err() {
            tracing::warn!(
                field = %field,
                target = std::any::type_name::<T>(),
                "field could not be converted; leaving default"
            );
            match previous {
                Some(previous) => target_fields.insert(field, previous),
                None => target_fields.remove(&field),
            };
        }
    }

    serde_json::from_value(Value::Object(target_fields)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct User {
        id: i64,
        name: String,
        age: u32,
        nickname: Option<String>,
        // domain-only
        session_token: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct UserRecord {
        id: i64,
        name: String,
        age: u32,
        nickname: Option<String>,
        // storage-only
        version: i32,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct StrictRecord {
        id: i64,
        // mismatched on purpose: entity has a string
        name: i64,
        age: u32,
    }

    fn sample() -> User {
        User {
            id: 7,
            name: "Ada".to_string(),
            age: 36,
            nickname: Some("countess".to_string()),
            session_token: "secret".to_string(),
        }
    }

    #[test]
    fn test_round_trip_on_mapped_fields() {
        let converter = ReflectConverter::<User, UserRecord>::new();
        let user = sample();

        let back = converter.to_entity(&converter.to_record(&user));

        assert_eq!(back.id, user.id);
        assert_eq!(back.name, user.name);
        assert_eq!(back.age, user.age);
        assert_eq!(back.nickname, user.nickname);
        // not mapped, so it does not survive
        assert_eq!(back.session_token, "");
    }

    #[test]
    fn test_unmatched_fields_keep_defaults() {
        let converter = ReflectConverter::<User, UserRecord>::new();
        let record = converter.to_record(&sample());
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_mismatched_field_left_at_default() {
        let converter = ReflectConverter::<User, StrictRecord>::new();
        let record = converter.to_record(&sample());

        assert_eq!(
            record,
            StrictRecord {
                id: 7,
                name: 0,
                age: 36,
            }
        );
    }

    #[test]
    fn test_to_many_preserves_order_and_empty() {
        let converter = ReflectConverter::<User, UserRecord>::new();
        let users: Vec<User> = (1..=3)
            .map(|i| User {
                id: i,
                ..sample()
            })
            .collect();

        let records = converter.to_many_records(&users);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let none: Vec<UserRecord> = converter.to_many_records(&[]);
        assert!(none.is_empty());
        let none: Vec<User> = converter.to_many_entities(&[]);
        assert!(none.is_empty());
    }

    struct UppercaseConverter;

    impl Converter<User, UserRecord> for UppercaseConverter {
        fn to_record(&self, entity: &User) -> UserRecord {
            UserRecord {
                id: entity.id,
                name: entity.name.to_uppercase(),
                ..Default::default()
            }
        }

        fn to_entity(&self, record: &UserRecord) -> User {
            User {
                id: record.id,
                name: record.name.clone(),
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_hand_written_converter() {
        let converter: Box<dyn Converter<User, UserRecord>> = Box::new(UppercaseConverter);
        let records = converter.to_many_records(&[sample()]);
        assert_eq!(records[0].name, "ADA");
    }

    #[test]
    fn test_identity_converter() {
        let converter = IdentityConverter;
        let record: UserRecord = Converter::<UserRecord, UserRecord>::to_record(
            &converter,
            &UserRecord {
                id: 3,
                ..Default::default()
            },
        );
        assert_eq!(record.id, 3);
    }
}
