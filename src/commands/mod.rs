// ABOUTME: Command module aggregator for the lparclone CLI.
// ABOUTME: Re-exports init, validate, provision, and rollback command handlers.

mod init;
mod provision;
mod rollback;
mod validate;

pub use init::init;
pub use provision::provision;
pub use rollback::{RollbackTarget, rollback};
pub use validate::validate;
