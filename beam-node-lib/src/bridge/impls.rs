//! Blanket [`ToTerm`]/[`FromTerm`] implementations for the scalar and
//! aggregate shapes every `#[derive]`-free field type reduces to.

use std::collections::{BTreeMap, HashMap};

use crate::term::Term;

use super::decode::{Decoder, FromTerm};
use super::encode::{Encoder, ToTerm};
use super::error::BridgeError;

macro_rules! int_scalar {
    ($($t:ty),+ $(,)?) => {
        $(
            impl ToTerm for $t {
                fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
                    enc.write_term(&Term::Int(i64::from(*self)))
                }
            }

            impl FromTerm for $t {
                fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
                    match dec.read_term()? {
                        Term::Int(n) => <$t>::try_from(n)
                            .map_err(|_| BridgeError::InvalidArgument(format!(
                                "{n} does not fit in {}", stringify!($t)
                            ))),
                        other => Err(super::decode::type_mismatch(stringify!($t), &other)),
                    }
                }
            }
        )+
    };
}

int_scalar!(i8, i16, i32, u8, u16, u32);

// i64/u64/isize/usize get their own impls: i64 needs no narrowing, the
// others narrow from i64 like the smaller ints above but don't all
// implement `From<Self> for i64` the macro relies on.
impl ToTerm for i64 {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_term(&Term::Int(*self))
    }
}

impl FromTerm for i64 {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        match dec.read_term()? {
            Term::Int(n) => Ok(n),
            other => Err(super::decode::type_mismatch("i64", &other)),
        }
    }
}

macro_rules! narrow_int_scalar {
    ($($t:ty),+ $(,)?) => {
        $(
            impl ToTerm for $t {
                fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
                    enc.write_term(&Term::Int(*self as i64))
                }
            }

            impl FromTerm for $t {
                fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
                    match dec.read_term()? {
                        Term::Int(n) => <$t>::try_from(n)
                            .map_err(|_| BridgeError::InvalidArgument(format!(
                                "{n} does not fit in {}", stringify!($t)
                            ))),
                        other => Err(super::decode::type_mismatch(stringify!($t), &other)),
                    }
                }
            }
        )+
    };
}

narrow_int_scalar!(u64, isize, usize);

impl ToTerm for f64 {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_term(&Term::Float(*self))
    }
}

impl FromTerm for f64 {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        match dec.read_term()? {
            Term::Float(x) => Ok(x),
            Term::Int(n) => Ok(n as f64),
            other => Err(super::decode::type_mismatch("f64", &other)),
        }
    }
}

impl ToTerm for f32 {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        (*self as f64).to_etf(enc)
    }
}

impl FromTerm for f32 {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        f64::from_etf(dec).map(|x| x as f32)
    }
}

impl ToTerm for bool {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_term(&Term::atom(if *self { "true" } else { "false" }))
    }
}

impl FromTerm for bool {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        dec.read_bool()
    }
}

impl ToTerm for String {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_text(self)
    }
}

impl FromTerm for String {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        dec.read_text()
    }
}

impl ToTerm for &str {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_text(self)
    }
}

/// Marks a `Vec<u8>` as a scalar byte sequence (always `Binary`) rather than
/// an ordered group of small-integer scalars — the same disambiguation
/// `serde_bytes` gives `serde`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl ToTerm for Bytes {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_term(&Term::Binary(self.0.clone()))
    }
}

impl FromTerm for Bytes {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        match dec.read_term()? {
            Term::Binary(bytes) => Ok(Bytes(bytes)),
            other => Err(super::decode::type_mismatch("binary", &other)),
        }
    }
}

/// A raw [`Term`] is already in its wire shape: write it back out verbatim
/// instead of running it through any policy. This lets callers that build
/// arguments by hand (the `rpc!` macro in particular) mix raw terms and
/// typed values behind the same [`ToTerm`] bound.
impl ToTerm for Term {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.write_term(self)
    }
}

impl<T: ToTerm> ToTerm for Option<T> {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        match self {
            None => enc.write_term(&Term::nil()),
            Some(value) => value.to_etf(enc),
        }
    }
}

impl<T: FromTerm> FromTerm for Option<T> {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        // Decide from the raw term, since `T::from_etf` would otherwise
        // consume the NIL itself and reject it as a type mismatch.
        let term = dec.read_term()?;
        if term.is_nil() {
            return Ok(None);
        }
        super::decode::from_term::<T>(term, dec.policy()).map(Some)
    }
}

impl<T: ToTerm> ToTerm for Vec<T> {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
        enc.begin_ordered(self.len())?;
        for item in self {
            item.to_etf(enc)?;
        }
        enc.end_ordered(self.len());
        Ok(())
    }
}

impl<T: FromTerm> FromTerm for Vec<T> {
    fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
        dec.read_ordered()?
            .into_iter()
            .map(|term| super::decode::from_term::<T>(term, dec.policy()))
            .collect()
    }
}

macro_rules! tuple_impl {
    ($($idx:tt => $name:ident),+ $(,)?) => {
        impl<$($name: ToTerm),+> ToTerm for ($($name,)+) {
            fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
                const LEN: usize = tuple_impl!(@count $($name)+);
                enc.begin_ordered(LEN)?;
                $(self.$idx.to_etf(enc)?;)+
                enc.end_ordered(LEN);
                Ok(())
            }
        }

        impl<$($name: FromTerm),+> FromTerm for ($($name,)+) {
            fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
                let elements = dec.read_ordered()?;
                const LEN: usize = tuple_impl!(@count $($name)+);
                if elements.len() != LEN {
                    return Err(BridgeError::InvalidArgument(format!(
                        "expected a {LEN}-element group, found {}", elements.len()
                    )));
                }
                let mut elements = elements.into_iter();
                let policy = dec.policy();
                Ok(($(super::decode::from_term::<$name>(elements.next().unwrap(), policy)?,)+))
            }
        }
    };
    (@count $($name:ident)+) => {
        <[()]>::len(&[$(tuple_impl!(@unit $name)),+])
    };
    (@unit $name:ident) => { () };
}

tuple_impl!(0 => A);
tuple_impl!(0 => A, 1 => B);
tuple_impl!(0 => A, 1 => B, 2 => C);
tuple_impl!(0 => A, 1 => B, 2 => C, 3 => D);
tuple_impl!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
tuple_impl!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);

macro_rules! keyed_map_impl {
    ($map:ident) => {
        impl<T: ToTerm> ToTerm for $map<String, T> {
            fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError> {
                enc.begin_keyed(self.len())?;
                for (key, value) in self {
                    enc.begin_keyword_pair();
                    enc.write_key(key)?;
                    value.to_etf(enc)?;
                }
                enc.end_keyed(self.len());
                Ok(())
            }
        }

        impl<T: FromTerm> FromTerm for $map<String, T> {
            fn from_etf(dec: &mut Decoder) -> Result<Self, BridgeError> {
                let mut view = dec.read_keyed()?;
                let keys: Vec<String> = view.keys().cloned().collect();
                let mut out = $map::new();
                for key in keys {
                    out.insert(key.clone(), view.take(&key)?);
                }
                Ok(out)
            }
        }
    };
}

keyed_map_impl!(HashMap);
keyed_map_impl!(BTreeMap);
