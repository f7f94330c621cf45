// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// The factory has verified the token before any of these run, so
// `ctx.identity()` only fails if a route was registered as public by mistake.
// All records are scoped to the caller's subject id.

pub mod avatar;
pub mod invoices;
pub mod projects;
pub mod subscriptions;
pub mod users;
pub mod whoami;
