//! A small reference engine around the operator interfaces of [crate::op]:
//! graph descriptions, variable scopes, shape/type inference over both,
//! an executor and the backward pass.
mod backward;
mod block;
mod executor;
mod infer;
mod scope;

pub use self::backward::append_backward;
pub use self::block::{BlockDesc, VarDesc};
pub use self::executor::Executor;
pub use self::infer::infer_op;
pub use self::scope::Scope;
