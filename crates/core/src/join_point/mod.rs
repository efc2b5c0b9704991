//! Join point implementations.
//!
//! A join point resolves its applicable advice once, on first use, and
//! keeps per-execution state in a separate frame so one join point can serve
//! many threads at once.

mod access;
mod caller_side;
mod field;
mod invocation;
mod method;
mod resolved;
mod snapshot;
mod target;
mod throws;

pub use access::Access;
pub use caller_side::CallerSideJoinPoint;
pub use field::FieldJoinPoint;
pub use invocation::{DetachedInvocation, Invocation};
pub use method::{MethodJoinPoint, Operation};
pub use snapshot::{AdviceGroupSnapshot, JoinPointSnapshot};
pub use target::Target;
pub use throws::ThrowsJoinPoint;
