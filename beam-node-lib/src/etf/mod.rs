//! The External Term Format wire layer: an append-only buffer
//! ([`Buffer`]) and a free-function codec ([`encode`]/[`decode`]) between
//! it and [`crate::term::Term`].

mod buffer;
mod codec;
mod error;
pub(crate) mod tags;

pub use buffer::Buffer;
pub use codec::{decode, encode};
pub use error::{DecodingError, EncodingError};
pub use tags::VERSION;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Pid, Term};

    fn round_trip(term: &Term) -> Term {
        let mut buf = Buffer::new();
        encode(term, &mut buf).expect("encode");
        let mut read = Buffer::from_bytes(buf.into_vec());
        decode(&mut read).expect("decode")
    }

    #[test]
    fn small_tuple_with_atom_and_integer_round_trips() {
        let mut buf = Buffer::with_version();
        encode(
            &Term::Tuple(vec![Term::atom("ok"), Term::Int(42)]),
            &mut buf,
        )
        .unwrap();
        assert_eq!(
            buf.into_vec(),
            vec![131, 104, 2, 119, 2, b'o', b'k', 97, 42]
        );
    }

    #[test]
    fn decode_map_with_atom_key() {
        let bytes = [
            131, 116, 0, 0, 0, 1, 119, 4, b'n', b'a', b'm', b'e', 109, 0, 0, 0, 3, b'b', b'o',
            b'b',
        ];
        let mut buf = Buffer::from_bytes(bytes.to_vec());
        buf.consume_version().unwrap();
        let term = decode(&mut buf).unwrap();
        assert_eq!(
            term,
            Term::Map(vec![(Term::atom("name"), Term::Binary(b"bob".to_vec()))])
        );
    }

    #[test]
    fn round_trip_scalars() {
        for term in [
            Term::Int(0),
            Term::Int(255),
            Term::Int(256),
            Term::Int(-1),
            Term::Int(i32::MAX as i64 + 1),
            Term::Int(i64::MIN),
            Term::Float(3.5),
            Term::atom("hello"),
            Term::String("hi".into()),
            Term::Binary(b"raw".to_vec()),
            Term::Bitstring(vec![1, 2, 3], 0),
        ] {
            assert_eq!(round_trip(&term), term);
        }
    }

    #[test]
    fn round_trip_tuple_list_map() {
        let term = Term::Tuple(vec![
            Term::List(vec![Term::Int(1), Term::Int(2), Term::Int(3)]),
            Term::Map(vec![(Term::atom("a"), Term::Int(1))]),
            Term::List(vec![]),
        ]);
        assert_eq!(round_trip(&term), term);
    }

    #[test]
    fn round_trip_pid() {
        let term = Term::Pid(Pid {
            node: "node@host".into(),
            num: 5,
            serial: 1,
            creation: 2,
        });
        assert_eq!(round_trip(&term), term);
    }

    #[test]
    fn integer_canonicalisation() {
        let mut buf = Buffer::new();
        encode(&Term::Int(200), &mut buf).unwrap();
        assert_eq!(buf.as_slice()[0], tags::SMALL_INTEGER);

        let mut buf = Buffer::new();
        encode(&Term::Int(1_000_000), &mut buf).unwrap();
        assert_eq!(buf.as_slice()[0], tags::INTEGER);

        let mut buf = Buffer::new();
        encode(&Term::Int(i64::MAX), &mut buf).unwrap();
        assert_eq!(buf.as_slice()[0], tags::SMALL_BIG);
    }

    #[test]
    fn list_without_nil_tail_is_rejected() {
        // LIST header claiming 1 element, one SMALL_INTEGER, then another
        // SMALL_INTEGER instead of NIL as the tail.
        let bytes = [tags::LIST, 0, 0, 0, 1, tags::SMALL_INTEGER, 1, tags::SMALL_INTEGER, 2];
        let mut buf = Buffer::from_bytes(bytes.to_vec());
        assert!(matches!(
            decode(&mut buf),
            Err(DecodingError::MissingListEnd)
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = Buffer::from_bytes(vec![250]);
        assert!(matches!(decode(&mut buf), Err(DecodingError::UnknownTag(250))));
    }

    #[test]
    fn atom_tag_equivalence_canonicalises_to_small_atom_utf8() {
        // Legacy ATOM tag (100), latin1.
        let bytes = [tags::ATOM, 0, 2, b'o', b'k'];
        let mut buf = Buffer::from_bytes(bytes.to_vec());
        let term = decode(&mut buf).unwrap();
        assert_eq!(term, Term::atom("ok"));

        let mut out = Buffer::new();
        encode(&term, &mut out).unwrap();
        assert_eq!(out.as_slice()[0], tags::SMALL_ATOM_UTF8);
    }

    #[test]
    fn bit_binary_with_nonzero_offset_rejected() {
        let bytes = [tags::BIT_BINARY, 0, 0, 0, 1, 3, 0xFF];
        let mut buf = Buffer::from_bytes(bytes.to_vec());
        assert!(matches!(
            decode(&mut buf),
            Err(DecodingError::UnsupportedBitOffset(3))
        ));
    }

    #[test]
    fn skip_term_advances_past_compound_value_without_decoding() {
        let mut buf = Buffer::new();
        encode(
            &Term::Tuple(vec![Term::List(vec![Term::Int(1), Term::Int(2)]), Term::atom("x")]),
            &mut buf,
        )
        .unwrap();
        encode(&Term::Int(99), &mut buf).unwrap();
        let mut read = Buffer::from_bytes(buf.into_vec());
        read.skip_term().unwrap();
        assert_eq!(decode(&mut read).unwrap(), Term::Int(99));
    }
}
