use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::Bson;
use serde::{de::Error, Deserialize, Serialize};

/// Names the kind of document an id points at, used when an id fails to
/// parse.
pub trait TypedIdMarker {
    fn kind() -> &'static str;
}

/// An ObjectId that cannot be mixed up with the id of another kind of
/// document. Stored and rendered as the 24 character hex string.
pub struct TypedId<T: TypedIdMarker>(ObjectId, PhantomData<T>);

impl<T: TypedIdMarker> TypedId<T> {
    pub fn new() -> TypedId<T> {
        TypedId(ObjectId::new(), PhantomData)
    }

    pub fn from_object_id(oid: ObjectId) -> TypedId<T> {
        TypedId(oid, PhantomData)
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl<T: TypedIdMarker> Default for TypedId<T> {
    fn default() -> TypedId<T> {
        TypedId::new()
    }
}

impl<T: TypedIdMarker> Copy for TypedId<T> {}

impl<T: TypedIdMarker> Clone for TypedId<T> {
    fn clone(&self) -> TypedId<T> {
        *self
    }
}

impl<T: TypedIdMarker> PartialEq for TypedId<T> {
    fn eq(&self, other: &TypedId<T>) -> bool {
        self.0 == other.0
    }
}

impl<T: TypedIdMarker> Eq for TypedId<T> {}

impl<T: TypedIdMarker> Hash for TypedId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<T: TypedIdMarker> Display for TypedId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0.to_hex())
    }
}

impl<T: TypedIdMarker> Debug for TypedId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}({})", T::kind(), self.0.to_hex())
    }
}

impl<T: TypedIdMarker> FromStr for TypedId<T> {
    type Err = TypedIdParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let oid = ObjectId::parse_str(s).map_err(|_| TypedIdParseError {
            kind: T::kind(),
            value: s.to_owned(),
        })?;

        Ok(TypedId(oid, PhantomData))
    }
}

impl<T: TypedIdMarker> Serialize for TypedId<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_hex().serialize(serializer)
    }
}

impl<'de, T: TypedIdMarker> Deserialize<'de> for TypedId<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TypedId::from_str(&s).map_err(D::Error::custom)
    }
}

impl<T: TypedIdMarker> From<TypedId<T>> for Bson {
    fn from(id: TypedId<T>) -> Bson {
        id.to_string().into()
    }
}

/// Converts a slice of ids into a bson array for `$in` queries.
pub fn to_bson_array<T: TypedIdMarker>(ids: &[TypedId<T>]) -> Bson {
    Bson::Array(ids.iter().map(|id| Bson::from(*id)).collect())
}

#[derive(Clone, Debug)]
pub struct TypedIdParseError {
    kind: &'static str,
    value: String,
}

impl Display for TypedIdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "'{}' is not a valid {} id", self.value, self.kind)
    }
}

impl std::error::Error for TypedIdParseError {}
