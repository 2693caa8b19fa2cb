//! Routing ETF bytes back into a typed value under an explicit [`Policy`].

use std::collections::HashMap;

use crate::etf::{Buffer, DecodingError};
use crate::term::Term;

use super::error::BridgeError;
use super::policy::{Policy, PolicyOverride, PolicyStack};

/// Implemented by every type that can be read back out of a decoded value.
pub trait FromTerm: Sized {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError>;
}

/// Drives one [`decode`] call: the input buffer plus the policy in effect
/// for whatever subtree is currently being read. Decoding is deliberately
/// tolerant of either wire shape for an ordered group (list or tuple) no
/// matter which one [`Policy::unkeyed`] would have produced on encode —
/// policy governs what *this side* writes, not what it accepts.
pub struct Decoder<'buf> {
    buf: &'buf mut Buffer,
    stack: PolicyStack,
}

impl<'buf> Decoder<'buf> {
    pub fn new(buf: &'buf mut Buffer, policy: Policy) -> Self {
        Self {
            buf,
            stack: PolicyStack::new(policy),
        }
    }

    pub fn policy(&self) -> Policy {
        self.stack.current()
    }

    pub fn with_override<R>(
        &mut self,
        over: Option<PolicyOverride>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let Some(over) = over else {
            return f(self);
        };
        self.stack.push(over);
        let result = f(self);
        self.stack.pop();
        result
    }

    /// Decode the next whole term generically.
    pub fn read_term(&mut self) -> Result<Term, BridgeError> {
        Ok(crate::etf::decode(self.buf)?)
    }

    pub fn read_text(&mut self) -> Result<String, BridgeError> {
        match self.read_term()? {
            Term::Atom(s) | Term::String(s) => Ok(s),
            Term::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| BridgeError::InvalidArgument(format!("non-UTF-8 binary: {e}"))),
            other => Err(type_mismatch("text", &other)),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool, BridgeError> {
        match self.read_term()? {
            Term::Atom(s) if s == "true" => Ok(true),
            Term::Atom(s) if s == "false" => Ok(false),
            other => Err(type_mismatch("boolean atom", &other)),
        }
    }

    /// Read an ordered group's elements as raw terms, accepting either a
    /// list or a tuple on the wire.
    pub fn read_ordered(&mut self) -> Result<Vec<Term>, BridgeError> {
        match self.read_term()? {
            Term::List(items) | Term::Tuple(items) => Ok(items),
            other => Err(type_mismatch("ordered group", &other)),
        }
    }

    /// Index a string-keyed group (map or keyword list) without decoding
    /// every value up front: one pass records each key's value offset,
    /// then [`KeyedView::take`] rewinds and decodes a field on demand.
    pub fn read_keyed(&mut self) -> Result<KeyedView<'_, 'buf>, BridgeError> {
        let tag = self.buf.read_tag()?;
        let mut entries = HashMap::new();
        if tag == crate::etf::tags::MAP {
            self.buf.read_u8()?; // consume tag
            let arity = self.buf.read_u32()?;
            for _ in 0..arity {
                let key = self.read_key()?;
                let offset = self.buf.read_pos();
                entries.insert(key, offset);
                self.buf.skip_term()?;
            }
        } else if tag == crate::etf::tags::NIL {
            self.buf.read_u8()?;
        } else if tag == crate::etf::tags::LIST {
            self.buf.read_u8()?;
            let len = self.buf.read_u32()?;
            for _ in 0..len {
                let pair_tag = self.buf.read_u8()?;
                let arity = match pair_tag {
                    t if t == crate::etf::tags::SMALL_TUPLE => self.buf.read_u8()? as u32,
                    t if t == crate::etf::tags::LARGE_TUPLE => self.buf.read_u32()?,
                    other => return Err(BridgeError::TypeMismatch {
                        expected: "2-tuple",
                        actual_tag: other,
                    }),
                };
                if arity != 2 {
                    return Err(BridgeError::InvalidArgument(format!(
                        "keyword list entry has arity {arity}, expected 2"
                    )));
                }
                let key = self.read_key()?;
                let offset = self.buf.read_pos();
                entries.insert(key, offset);
                self.buf.skip_term()?;
            }
            let tail = self.buf.read_u8()?;
            if tail != crate::etf::tags::NIL {
                return Err(DecodingError::MissingListEnd.into());
            }
        } else {
            return Err(BridgeError::TypeMismatch {
                expected: "keyed group",
                actual_tag: tag,
            });
        }
        Ok(KeyedView {
            decoder: self,
            entries,
        })
    }

    fn read_key(&mut self) -> Result<String, BridgeError> {
        match self.read_term()? {
            Term::Atom(s) | Term::String(s) => Ok(s),
            Term::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| BridgeError::InvalidArgument(format!("non-UTF-8 key: {e}"))),
            other => Err(type_mismatch("key", &other)),
        }
    }
}

/// A lazily-indexed view over one decoded keyed group. Fields are looked up
/// and decoded on demand, in whatever order the caller's `FromTerm` impl
/// asks for them, by rewinding the decoder's read cursor.
pub struct KeyedView<'dec, 'buf> {
    decoder: &'dec mut Decoder<'buf>,
    entries: HashMap<String, usize>,
}

impl KeyedView<'_, '_> {
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn take<T: FromTerm>(&mut self, key: &str) -> Result<T, BridgeError> {
        let offset = *self
            .entries
            .get(key)
            .ok_or_else(|| BridgeError::KeyNotFound(key.to_string()))?;
        self.decoder.buf.set_read_pos(offset);
        T::from_etf(self.decoder)
    }

    pub fn take_optional<T: FromTerm>(&mut self, key: &str) -> Result<Option<T>, BridgeError> {
        match self.entries.get(key).copied() {
            None => Ok(None),
            Some(offset) => {
                self.decoder.buf.set_read_pos(offset);
                T::from_etf(self.decoder).map(Some)
            }
        }
    }
}

pub(crate) fn type_mismatch(expected: &'static str, found: &Term) -> BridgeError {
    use crate::etf::tags;
    let actual_tag = match found {
        Term::Int(_) => tags::SMALL_INTEGER,
        Term::Float(_) => tags::NEW_FLOAT,
        Term::Atom(_) => tags::SMALL_ATOM_UTF8,
        Term::String(_) => tags::STRING,
        Term::Binary(_) => tags::BINARY,
        Term::Bitstring(..) => tags::BIT_BINARY,
        Term::Tuple(_) => tags::SMALL_TUPLE,
        Term::List(_) => tags::LIST,
        Term::Map(_) => tags::MAP,
        Term::Pid(_) => tags::NEW_PID,
        Term::Port(_) => tags::NEW_PORT,
        Term::Reference(_) => tags::NEWER_REFERENCE,
        Term::Fun(_) => tags::NEW_FUN,
    };
    BridgeError::TypeMismatch {
        expected,
        actual_tag,
    }
}

/// Decode a versioned ETF buffer into `T` under `policy`.
pub fn decode<T: FromTerm>(buf: &mut Buffer, policy: Policy) -> Result<T, BridgeError> {
    buf.consume_version()?;
    let mut dec = Decoder::new(buf, policy);
    T::from_etf(&mut dec)
}

/// Re-decode an already-materialised [`Term`] (e.g. one element of a
/// `read_ordered`/`read_keyed` group) as `T`, under the same policy as the
/// surrounding value. Round-trips through a scratch buffer so every
/// `FromTerm` impl can stay written against [`Decoder`] without a second,
/// term-shaped decode path.
pub(crate) fn from_term<T: FromTerm>(term: Term, policy: Policy) -> Result<T, BridgeError> {
    let mut buf = Buffer::with_version();
    crate::etf::encode(&term, &mut buf)?;
    buf.consume_version()?;
    let mut dec = Decoder::new(&mut buf, policy);
    T::from_etf(&mut dec)
}
