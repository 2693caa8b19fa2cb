//! Ergonomic dynamic-dispatch façade over [`crate::node::Connection::rpc_raw`]:
//! resolve a module/function path, forward arguments (raw terms or typed
//! values routed through the bridge), detect `{:badrpc, _}`, and decode the
//! reply.

mod error;

pub use error::RpcError;

use std::time::Duration;

use crate::bridge::{self, BridgeError, Encoder, FromTerm, Policy, ToTerm};
use crate::etf::Buffer;
use crate::node::Connection;
use crate::term::Term;

/// A module path, either `Elixir.<Name>` or a bare Erlang module name.
pub struct Module(String);

impl Module {
    pub fn elixir(name: &str) -> Self {
        Module(format!("Elixir.{name}"))
    }

    pub fn erlang(name: &str) -> Self {
        Module(name.to_string())
    }

    pub fn function(self, name: &str) -> Call {
        Call {
            module: self.0,
            function: name.to_string(),
            args: Vec::new(),
            deadline: None,
            connection: None,
        }
    }
}

/// A not-yet-run remote call, built up with raw or typed arguments.
pub struct Call {
    module: String,
    function: String,
    args: Vec<Term>,
    deadline: Option<Duration>,
    connection: Option<Connection>,
}

impl Call {
    pub fn arg_term(mut self, term: Term) -> Self {
        self.args.push(term);
        self
    }

    pub fn args(mut self, terms: Vec<Term>) -> Self {
        self.args = terms;
        self
    }

    /// Append one typed argument, routed through the bridge under `policy`
    /// and spliced in alongside any raw-term arguments already present.
    pub fn arg(mut self, value: &impl ToTerm, policy: Policy) -> Result<Self, RpcError> {
        self.args.push(value_to_term(value, policy)?);
        Ok(self)
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn on(mut self, conn: &Connection) -> Self {
        self.connection = Some(conn.clone());
        self
    }

    /// Run the call, returning the raw (but badrpc-checked) reply term.
    /// Fails with [`RpcError::MissingConnection`] if [`Call::on`] was never
    /// called — the DSL macro is the common path that always binds one, but
    /// the builder can be handed around unbound first.
    pub async fn run(self) -> Result<Term, RpcError> {
        let conn = self.connection.ok_or(RpcError::MissingConnection)?;
        call(&conn, &self.module, &self.function, self.args, self.deadline).await
    }

    pub async fn run_decoded<T: FromTerm>(self, policy: Policy) -> Result<T, RpcError> {
        let conn = self.connection.clone().ok_or(RpcError::MissingConnection)?;
        call_decoded(
            &conn,
            &self.module,
            &self.function,
            self.args,
            self.deadline,
            policy,
        )
        .await
    }
}

/// Call `module:function(args)` over `conn`, surfacing `{:badrpc, reason}`
/// replies as [`RpcError::BadRpc`] instead of handing them back as data.
pub async fn call(
    conn: &Connection,
    module: &str,
    function: &str,
    args: Vec<Term>,
    deadline: Option<Duration>,
) -> Result<Term, RpcError> {
    let reply = conn.rpc_raw(module, function, args, deadline).await?;
    if let Term::Tuple(items) = &reply {
        if items.len() == 2 && items[0].as_atom() == Some("badrpc") {
            return Err(RpcError::BadRpc(items[1].clone()));
        }
    }
    Ok(reply)
}

/// Like [`call`], but decodes the reply into `T` via the bridge under
/// `policy` once badrpc has been ruled out. Supports return arity > 1: a
/// tuple reply decodes into any `T` whose [`FromTerm`] impl reads an
/// ordered group.
pub async fn call_decoded<T: FromTerm>(
    conn: &Connection,
    module: &str,
    function: &str,
    args: Vec<Term>,
    deadline: Option<Duration>,
    policy: Policy,
) -> Result<T, RpcError> {
    let reply = call(conn, module, function, args, deadline).await?;
    bridge::from_term(reply, policy).map_err(RpcError::from)
}

/// Encode `value` under `policy` and decode it straight back into a generic
/// [`Term`], so a typed argument can sit in the same argument list as
/// hand-built raw terms.
fn value_to_term(value: &impl ToTerm, policy: Policy) -> Result<Term, BridgeError> {
    let mut buf = Buffer::with_version();
    {
        let mut enc = Encoder::new(&mut buf, policy);
        value.to_etf(&mut enc)?;
    }
    buf.consume_version()?;
    Ok(crate::etf::decode(&mut buf)?)
}

/// Syntactic sugar over [`Module`]/[`Call`] matching the
/// `Elixir.<Module>.<func>(conn, args…)` call shape. Expands to a future
/// that resolves to `Result<Term, RpcError>`; callers still `.await` it.
///
/// Each argument goes through [`Call::arg`], so a raw [`Term`] is passed
/// verbatim (its [`ToTerm`] impl just writes itself back out) and any other
/// typed value is routed through the bridge under [`Policy::default`] —
/// the two argument overloads the DSL promises, both handled by the same
/// expansion since [`Term`] itself implements [`ToTerm`].
///
/// ```ignore
/// let reply = rpc!(Elixir.Kernel.is_atom(&conn, Term::atom("foo"))).await?;
/// let mixed = rpc!(erlang.atom_to_binary(&conn, Term::atom("foo"), 42_i64)).await?;
/// ```
#[macro_export]
macro_rules! rpc {
    (Elixir . $module:ident . $func:ident ( $conn:expr $(, $arg:expr)* $(,)? )) => {
        async {
            let mut call = $crate::rpc::Module::elixir(stringify!($module))
                .function(stringify!($func));
            $(
                call = call.arg(&$arg, $crate::bridge::Policy::default())?;
            )*
            call.on($conn).run().await
        }
    };
    ($module:ident . $func:ident ( $conn:expr $(, $arg:expr)* $(,)? )) => {
        async {
            let mut call = $crate::rpc::Module::erlang(stringify!($module))
                .function(stringify!($func));
            $(
                call = call.arg(&$arg, $crate::bridge::Policy::default())?;
            )*
            call.on($conn).run().await
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{KeyedPolicy, KeyStyle, StringPolicy, UnkeyedPolicy};

    #[test]
    fn elixir_module_path_is_prefixed() {
        let call = Module::elixir("Kernel").function("is_atom");
        assert_eq!(call.module, "Elixir.Kernel");
        assert_eq!(call.function, "is_atom");
    }

    #[test]
    fn erlang_module_path_is_bare() {
        let call = Module::erlang("erlang").function("node");
        assert_eq!(call.module, "erlang");
    }

    #[test]
    fn typed_argument_round_trips_through_value_to_term() {
        let policy = Policy::new(StringPolicy::Binary, UnkeyedPolicy::List, KeyedPolicy::Map(KeyStyle::Atom));
        let term = value_to_term(&"hi".to_string(), policy).unwrap();
        assert_eq!(term, Term::Binary(b"hi".to_vec()));
    }

    #[tokio::test]
    async fn running_an_unbound_call_surfaces_missing_connection() {
        let call = Module::elixir("Kernel").function("is_atom").arg_term(Term::atom("foo"));
        let err = call.run().await.unwrap_err();
        assert!(matches!(err, RpcError::MissingConnection));
    }
}
