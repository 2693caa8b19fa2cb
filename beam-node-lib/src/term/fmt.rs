use std::fmt;

use super::{Fun, Pid, Port, Reference, Term};

/// Debug rendering follows Elixir's term syntax: atoms as `:name`, tuples
/// as `{...}`, lists as `[...]`, and binaries as a quoted string when they
/// hold valid UTF-8, falling back to a byte list otherwise. This is purely
/// a debugging aid, not a stable interface.
impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(n) => write!(f, "{n}"),
            Term::Float(x) => write!(f, "{x}"),
            Term::Atom(name) => write!(f, ":{name}"),
            Term::String(s) => write!(f, "{s:?}"),
            Term::Binary(bytes) => fmt_binary(bytes, f),
            Term::Bitstring(bytes, trailing) => {
                write!(f, "<<")?;
                fmt_byte_list(bytes, f)?;
                write!(f, "::size({trailing})>>")
            }
            Term::Tuple(items) => {
                write!(f, "{{")?;
                fmt_joined(items, f)?;
                write!(f, "}}")
            }
            Term::List(items) => {
                write!(f, "[")?;
                fmt_joined(items, f)?;
                write!(f, "]")
            }
            Term::Map(pairs) => {
                write!(f, "%{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                write!(f, "}}")
            }
            Term::Pid(pid) => write!(f, "{pid}"),
            Term::Port(port) => write!(f, "{port}"),
            Term::Reference(r) => write!(f, "{r}"),
            Term::Fun(fun) => write!(f, "{fun}"),
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#PID<{}.{}.{}@{}>",
            self.creation, self.num, self.serial, self.node
        )
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Port<{}.{}@{}>", self.creation, self.id, self.node)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Reference<{}", self.creation)?;
        for id in &self.ids {
            write!(f, ".{id}")?;
        }
        write!(f, "@{}>", self.node)
    }
}

impl fmt::Display for Fun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fun::Export {
                module,
                function,
                arity,
            } => write!(f, "&{module}.{function}/{arity}"),
            Fun::Closure {
                module,
                arity,
                index,
                ..
            } => write!(f, "#Fun<{module}.{index}.{arity}>"),
        }
    }
}

fn fmt_joined(items: &[Term], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn fmt_binary(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match std::str::from_utf8(bytes) {
        Ok(s) => write!(f, "{s:?}"),
        Err(_) => {
            write!(f, "<<")?;
            fmt_byte_list(bytes, f)?;
            write!(f, ">>")
        }
    }
}

fn fmt_byte_list(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{b}")?;
    }
    Ok(())
}
