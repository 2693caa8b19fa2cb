use super::{Pid, Term};

/// An opaque fun value: either a reference to an exported `Module:Function/Arity`
/// or a closure captured over free variables.
///
/// Carries enough fields for structural equality and rehashing but nothing
/// that would let client code synthesize a callable fun out of thin air —
/// only the codec produces these, from bytes that actually came off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fun {
    Export {
        module: String,
        function: String,
        arity: u8,
    },
    Closure {
        module: String,
        arity: u8,
        index: u32,
        uniq: [u8; 16],
        old_index: u32,
        old_uniq: u32,
        pid: Pid,
        free_vars: Vec<Term>,
    },
}
