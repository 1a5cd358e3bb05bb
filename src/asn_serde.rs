//! Module that (de-)serializes AS numbers the way the topology artifacts carry them: as strings.
//!
//! Deserialization also accepts plain JSON numbers.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserializer, Serializer};

use crate::as_graph::ASN;

struct AsnVisitor;

impl<'de> Visitor<'de> for AsnVisitor {
    type Value = ASN;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an AS number as string or integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ASN, E> {
        ASN::try_from(v).map_err(|_| E::custom(format!("AS number {} too large", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ASN, E> {
        ASN::try_from(v).map_err(|_| E::custom(format!("invalid AS number {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ASN, E> {
        v.trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid AS number {:?}", v)))
    }
}

pub fn serialize<S: Serializer>(asn: &ASN, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&asn.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ASN, D::Error> {
    deserializer.deserialize_any(AsnVisitor)
}

/// Same as the parent module, for `Vec<ASN>`.
pub mod list {
    use super::*;

    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<ASN>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a list of AS numbers")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<ASN>, A::Error> {
            let mut result = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(asn) = seq.next_element::<Wrapped>()? {
                result.push(asn.0);
            }
            Ok(result)
        }
    }

    struct Wrapped(ASN);

    impl<'de> serde::Deserialize<'de> for Wrapped {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(AsnVisitor).map(Wrapped)
        }
    }

    pub fn serialize<S: Serializer>(asns: &[ASN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(asns.iter().map(|asn| asn.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ASN>, D::Error> {
        deserializer.deserialize_seq(ListVisitor)
    }
}

/// Same as the parent module, for `Option<ASN>`; `null` is `None`.
pub mod option {
    use super::*;

    struct OptionVisitor;

    impl<'de> Visitor<'de> for OptionVisitor {
        type Value = Option<ASN>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "an optional AS number")
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<ASN>, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<ASN>, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Option<ASN>, D::Error> {
            d.deserialize_any(AsnVisitor).map(Some)
        }
    }

    pub fn serialize<S: Serializer>(asn: &Option<ASN>, serializer: S) -> Result<S::Ok, S::Error> {
        match asn {
            Some(asn) => serializer.serialize_some(&asn.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ASN>, D::Error> {
        deserializer.deserialize_option(OptionVisitor)
    }
}
