//! Consumer callback contract.
//!
//! The managers accept callbacks of either arity: some consumers care
//! about the decoded body, others only about the fact that a message
//! arrived. A dynamic language would inspect the callable at runtime;
//! here the distinction is made statically with a marker type
//! parameter, so both of these work:
//!
//! ```rust
//! # fn on_message<A>(_: impl lapin_queue::OnMessage<A>) {}
//! on_message(|body: serde_json::Value| println!("{body}"));
//! on_message(|| println!("got one"));
//! ```

use serde_json::Value;

/// A consumer callback, invoked once per inbound message with the
/// decoded JSON body.
///
/// Implemented for `FnMut(serde_json::Value)` and for `FnMut()`; the
/// `A` parameter only selects between the two and is inferred at the
/// call site.
pub trait OnMessage<A>: Send + 'static {
    /// Hand one decoded body to the callback
    fn call(&mut self, body: Value);
}

impl<F> OnMessage<(Value,)> for F
where
    F: FnMut(Value) + Send + 'static,
{
    fn call(&mut self, body: Value) {
        self(body);
    }
}

impl<F> OnMessage<()> for F
where
    F: FnMut() + Send + 'static,
{
    fn call(&mut self, _body: Value) {
        self();
    }
}
