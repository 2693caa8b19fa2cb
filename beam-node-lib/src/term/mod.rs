//! The central sum type: every value the distribution protocol can carry.

mod fmt;
mod fun;
mod ids;

pub use fun::Fun;
pub use ids::{Pid, Port, Reference};

use std::hash::{Hash, Hasher};

/// A decoded Erlang term.
///
/// Variants map directly onto the shapes described by the External Term
/// Format; see [`crate::etf::codec`] for the wire encodings that collapse
/// onto each one. Improper lists are not representable: [`Term::List`] is
/// always a proper list.
#[derive(Clone)]
pub enum Term {
    Int(i64),
    Float(f64),
    /// A printable interned name.
    Atom(String),
    /// The "charlist shorthand" form: a list of small integers encoded
    /// compactly as `STRING`. Distinct from [`Term::Binary`].
    String(String),
    Binary(Vec<u8>),
    /// A byte-aligned bitstring. `trailing_bits` is the number of valid
    /// bits in the final byte (0 means "all 8 bits", i.e. a plain binary
    /// padded out to `BIT_BINARY` for some other reason).
    Bitstring(Vec<u8>, u8),
    Tuple(Vec<Term>),
    /// A proper list; the empty list is `List(vec![])`, identical to NIL.
    List(Vec<Term>),
    /// An association list in wire order. Re-encoding a `Map` decoded from
    /// the wire reproduces the same byte order.
    Map(Vec<(Term, Term)>),
    Pid(Pid),
    Port(Port),
    Reference(Reference),
    Fun(Fun),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Term {
        Term::Atom(name.into())
    }

    pub fn tuple(elements: impl IntoIterator<Item = Term>) -> Term {
        Term::Tuple(elements.into_iter().collect())
    }

    pub fn list(elements: impl IntoIterator<Item = Term>) -> Term {
        Term::List(elements.into_iter().collect())
    }

    /// Idiomatic Erlang nil: the empty list, not a separate variant.
    pub fn nil() -> Term {
        Term::List(Vec::new())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::List(items) if items.is_empty())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

/// `f64` does not implement `Eq`; the round-trip law only ever needs
/// bit-exact comparison because encode/decode preserve the IEEE-754
/// representation verbatim, so we compare floats by bit pattern rather
/// than value. This lets every other variant derive structural equality
/// through the same `PartialEq` impl without special-casing `NaN`.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        use Term::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Atom(a), Atom(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (Bitstring(a, ta), Bitstring(b, tb)) => a == b && ta == tb,
            (Tuple(a), Tuple(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Pid(a), Pid(b)) => a == b,
            (Port(a), Port(b)) => a == b,
            (Reference(a), Reference(b)) => a == b,
            (Fun(a), Fun(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Term::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Int(n) => n.hash(state),
            Float(f) => f.to_bits().hash(state),
            Atom(s) | String(s) => s.hash(state),
            Binary(b) => b.hash(state),
            Bitstring(b, t) => {
                b.hash(state);
                t.hash(state);
            }
            Tuple(items) | List(items) => items.hash(state),
            Map(pairs) => pairs.hash(state),
            Pid(p) => p.hash(state),
            Port(p) => p.hash(state),
            Reference(r) => r.hash(state),
            Fun(f) => f.hash(state),
        }
    }
}
