//! Generic typed encode/decode bridge: routes aggregate Rust values through
//! [`Policy`]-governed ETF shapes instead of hand-writing [`crate::term::Term`]
//! construction for every message type.
//!
//! A record type implements [`ToTerm`]/[`FromTerm`] by calling back into the
//! [`Encoder`]/[`Decoder`] for its group header, the way a hand-rolled
//! `serde::Serialize` impl calls into a `Serializer`. [`encode`]/[`decode`]
//! are the facades most callers use.

mod decode;
mod encode;
mod error;
mod impls;
mod policy;

pub use decode::{decode, Decoder, FromTerm, KeyedView};
pub(crate) use decode::from_term;
pub use encode::{encode, Encoder, ToTerm};
pub use error::BridgeError;
pub use impls::Bytes;
pub use policy::{KeyStyle, KeyedPolicy, Policy, PolicyOverride, StringPolicy, UnkeyedPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    impl ToTerm for Person {
        fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
            enc.begin_keyed(2)?;
            enc.begin_keyword_pair();
            enc.write_key("name")?;
            self.name.to_etf(enc)?;
            enc.begin_keyword_pair();
            enc.write_key("age")?;
            self.age.to_etf(enc)?;
            enc.end_keyed(2);
            Ok(())
        }
    }

    impl FromTerm for Person {
        fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
            let mut view = dec.read_keyed()?;
            Ok(Person {
                name: view.take("name")?,
                age: view.take("age")?,
            })
        }
    }

    fn map_policy() -> Policy {
        Policy::new(
            StringPolicy::Binary,
            UnkeyedPolicy::List,
            KeyedPolicy::Map(KeyStyle::Atom),
        )
    }

    #[test]
    fn record_round_trips_under_map_atom_key_policy() {
        let bob = Person {
            name: "bob".into(),
            age: 36,
        };
        let policy = map_policy();
        let mut buf = encode(&bob, policy).unwrap();
        let decoded: Person = decode(&mut buf, policy).unwrap();
        assert_eq!(decoded, bob);
    }

    #[test]
    fn record_round_trips_under_keyword_list_policy() {
        let bob = Person {
            name: "bob".into(),
            age: 36,
        };
        let policy = Policy::new(
            StringPolicy::Binary,
            UnkeyedPolicy::List,
            KeyedPolicy::KeywordList,
        );
        let mut buf = encode(&bob, policy).unwrap();
        let decoded: Person = decode(&mut buf, policy).unwrap();
        assert_eq!(decoded, bob);
    }

    #[test]
    fn string_policy_governs_scalar_text_encoding() {
        let mut atom_buf = encode(&"hi".to_string(), Policy::new(
            StringPolicy::Atom,
            UnkeyedPolicy::List,
            KeyedPolicy::default(),
        )).unwrap();
        atom_buf.consume_version().unwrap();
        let term = crate::etf::decode(&mut atom_buf).unwrap();
        assert_eq!(term, crate::term::Term::atom("hi"));

        let mut binary_buf = encode(&"hi".to_string(), map_policy()).unwrap();
        binary_buf.consume_version().unwrap();
        let term = crate::etf::decode(&mut binary_buf).unwrap();
        assert_eq!(term, crate::term::Term::Binary(b"hi".to_vec()));
    }

    #[test]
    fn ordered_group_round_trips_as_tuple_policy() {
        let policy = Policy::new(
            StringPolicy::Binary,
            UnkeyedPolicy::Tuple,
            KeyedPolicy::default(),
        );
        let values: Vec<i32> = vec![1, 2, 3];
        let mut buf = encode(&values, policy).unwrap();
        let decoded: Vec<i32> = decode(&mut buf, policy).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn missing_key_surfaces_as_bridge_error() {
        #[derive(Debug)]
        struct Incomplete;

        impl FromTerm for Incomplete {
            fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
                let mut view = dec.read_keyed()?;
                let _: String = view.take("missing")?;
                Ok(Incomplete)
            }
        }

        let bob = Person {
            name: "bob".into(),
            age: 36,
        };
        let policy = map_policy();
        let mut buf = encode(&bob, policy).unwrap();
        let err = decode::<Incomplete>(&mut buf, policy).unwrap_err();
        assert!(matches!(err, BridgeError::KeyNotFound(key) if key == "missing"));
    }

    #[test]
    fn optional_field_decodes_as_none_from_nil() {
        let policy = map_policy();
        let mut buf = encode(&Option::<i32>::None, policy).unwrap();
        let decoded: Option<i32> = decode(&mut buf, policy).unwrap();
        assert_eq!(decoded, None);

        let mut buf = encode(&Some(7i32), policy).unwrap();
        let decoded: Option<i32> = decode(&mut buf, policy).unwrap();
        assert_eq!(decoded, Some(7));
    }
}
