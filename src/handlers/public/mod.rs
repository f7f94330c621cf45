// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service metadata, availability checks, the plan catalogue and the
// password-reset flow. Inputs come from anonymous callers and are always
// validated before a store is touched.

pub mod availability;
pub mod password_reset;
pub mod plans;
pub mod root;
