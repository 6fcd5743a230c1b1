//! Routing diagnostics.
//!
//! Successful routing tags the statement context so trace logging can show
//! where the statement went. No marker means routing did not occur, e.g.
//! transaction passthrough.

use std::fmt;

use crate::statement::{Context, ContextValue};

/// Context key the route marker is stored under.
pub const ROUTE_MODE_KEY: &str = "dbroute:route_mode";

/// Role of the pool a statement was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// Record the route taken in the statement context.
pub fn mark(ctx: &mut Context, shard: &str, role: Role) {
    let mode = if shard.is_empty() {
        role.to_string()
    } else {
        format!("{}-{}", shard, role)
    };
    ctx.insert(ROUTE_MODE_KEY, mode);
}

/// Route marker, if the statement was routed.
pub fn route_mode(ctx: &Context) -> Option<&str> {
    match ctx.get(ROUTE_MODE_KEY)? {
        ContextValue::Str(mode) => Some(mode),
        _ => None,
    }
}

/// Prefix a statement with its route marker, the way trace loggers render
/// it. Unrouted statements come back unchanged.
pub fn format_trace(ctx: &Context, sql: &str) -> String {
    match route_mode(ctx) {
        Some(mode) => format!("[{}] {}", mode, sql),
        None => sql.to_string(),
    }
}
