//! Remote completion service plumbing: the HTTP client and the retrying
//! invoker layered on top of it.

pub mod client;
pub mod retry;

pub use client::{ChatClient, Completion};
pub use retry::{Invoke, Invoker, RetryPolicy};
