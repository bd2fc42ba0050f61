//! Demo services for the four RPC interaction patterns: a calculator and
//! a greeter, both registered on a [`rpcflow_lite`] router and driven over
//! an in-process link by the binaries in `src/bin/`.

pub mod calculator;
pub mod greeter;
pub mod proto;

use rpcflow_lite::{RpcRouter, RpcServerError};

/// Register both demo services on one router.
pub fn register_all(router: &mut RpcRouter) -> Result<(), RpcServerError> {
    calculator::register(router)?;
    greeter::register(router)?;
    Ok(())
}
