//! Routing a typed value into ETF bytes under an explicit [`Policy`].

use crate::etf::{tags, Buffer};
use crate::term::Term;

use super::error::BridgeError;
use super::policy::{KeyStyle, KeyedPolicy, Policy, PolicyOverride, PolicyStack, UnkeyedPolicy};

/// Implemented by every type that can appear inside an encoded value.
/// Scalars write themselves directly; aggregates call back into the
/// [`Encoder`] for their group's header and recurse into each element.
pub trait ToTerm {
    fn to_etf(&self, enc: &mut Encoder) -> Result<(), BridgeError>;
}

/// Drives one [`encode`] call: the output buffer plus the policy in effect
/// for whatever subtree is currently being written.
pub struct Encoder<'buf> {
    buf: &'buf mut Buffer,
    stack: PolicyStack,
}

impl<'buf> Encoder<'buf> {
    pub fn new(buf: &'buf mut Buffer, policy: Policy) -> Self {
        Self {
            buf,
            stack: PolicyStack::new(policy),
        }
    }

    pub fn policy(&self) -> Policy {
        self.stack.current()
    }

    /// Run `f` with `over` merged into the current policy, then restore the
    /// prior policy. The pop happens unconditionally right after `f`
    /// returns, so it runs whether `f` succeeded or produced an error —
    /// mirroring the connection guards' "restore state on every exit path"
    /// discipline, just without needing `Drop` since there is no unwinding
    /// across this call.
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

    /// Write an already-assembled [`Term`] verbatim, bypassing policy.
    /// Scalar leaves use this; aggregates use the group methods below so
    /// their element count can be streamed rather than buffered twice.
    pub fn write_term(&mut self, term: &Term) -> Result<(), BridgeError> {
        crate::etf::encode(term, self.buf)?;
        Ok(())
    }

    pub fn write_text(&mut self, s: &str) -> Result<(), BridgeError> {
        let term = match self.policy().string {
            super::policy::StringPolicy::Binary => Term::Binary(s.as_bytes().to_vec()),
            super::policy::StringPolicy::Atom => Term::atom(s),
            super::policy::StringPolicy::Charlist => Term::String(s.to_string()),
        };
        self.write_term(&term)
    }

    /// Write the header of an ordered group (list or tuple, per policy) of
    /// `len` elements. Callers must follow with exactly `len` calls to
    /// [`ToTerm::to_etf`] and then [`Encoder::end_ordered`].
    pub fn begin_ordered(&mut self, len: usize) -> Result<(), BridgeError> {
        match self.policy().unkeyed {
            UnkeyedPolicy::List => {
                if len > 0 {
                    self.buf.append_byte(tags::LIST);
                    self.buf.append_bytes(&(len as u32).to_be_bytes());
                }
                // len == 0: the NIL tail below is the whole encoding.
            }
            UnkeyedPolicy::Tuple => {
                if len <= 0xFF {
                    self.buf.append_byte(tags::SMALL_TUPLE);
                    self.buf.append_byte(len as u8);
                } else {
                    self.buf.append_byte(tags::LARGE_TUPLE);
                    self.buf.append_bytes(&(len as u32).to_be_bytes());
                }
            }
        }
        Ok(())
    }

    /// Close an ordered group opened with [`Encoder::begin_ordered`]. Only
    /// the list encoding needs a trailing marker; a tuple's arity already
    /// said everything.
    pub fn end_ordered(&mut self, len: usize) {
        if matches!(self.policy().unkeyed, UnkeyedPolicy::List) {
            self.buf.append_byte(tags::NIL);
            let _ = len;
        }
    }

    /// Write the header for a string-keyed group of `len` pairs, per
    /// policy. For `KeyedPolicy::Map` this is the whole header; for
    /// `KeyedPolicy::KeywordList` it is a list header, and each pair must
    /// additionally be wrapped with [`Encoder::begin_keyword_pair`].
    pub fn begin_keyed(&mut self, len: usize) -> Result<(), BridgeError> {
        match self.policy().keyed {
            KeyedPolicy::Map(_) => {
                self.buf.append_byte(tags::MAP);
                self.buf.append_bytes(&(len as u32).to_be_bytes());
            }
            KeyedPolicy::KeywordList => {
                if len > 0 {
                    self.buf.append_byte(tags::LIST);
                    self.buf.append_bytes(&(len as u32).to_be_bytes());
                }
            }
        }
        Ok(())
    }

    pub fn end_keyed(&mut self, _len: usize) {
        if matches!(self.policy().keyed, KeyedPolicy::KeywordList) {
            self.buf.append_byte(tags::NIL);
        }
    }

    /// Write one key, honouring [`KeyStyle`] under `KeyedPolicy::Map`. Under
    /// `KeyedPolicy::KeywordList` the key is always an atom, and the
    /// `{key, value}` tuple wrapper must be opened first with
    /// [`Encoder::begin_keyword_pair`].
    pub fn write_key(&mut self, key: &str) -> Result<(), BridgeError> {
        let term = match self.policy().keyed {
            KeyedPolicy::Map(KeyStyle::Atom) => Term::atom(key),
            KeyedPolicy::Map(KeyStyle::Binary) => Term::Binary(key.as_bytes().to_vec()),
            KeyedPolicy::KeywordList => Term::atom(key),
        };
        self.write_term(&term)
    }

    /// Under `KeyedPolicy::KeywordList`, open the 2-tuple that wraps one
    /// `{key, value}` pair. No-op under `KeyedPolicy::Map`, where a pair is
    /// just a key write followed by a value write.
    pub fn begin_keyword_pair(&mut self) {
        if matches!(self.policy().keyed, KeyedPolicy::KeywordList) {
            self.buf.append_byte(tags::SMALL_TUPLE);
            self.buf.append_byte(2);
        }
    }
}

/// Encode `value` into a versioned ETF buffer under `policy`.
pub fn encode<T: ToTerm>(value: &T, policy: Policy) -> Result<Buffer, BridgeError> {
    let mut buf = Buffer::with_version();
    {
        let mut enc = Encoder::new(&mut buf, policy);
        value.to_etf(&mut enc)?;
    }
    Ok(buf)
}
