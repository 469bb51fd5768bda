//! External process execution and stub provisioning for mallet tasks.
//!
//! Three concerns, one per module: spawning the delegated tools and
//! propagating their exit statuses ([`process`]), querying the package
//! installer for an installed library's location ([`locate`]), and the
//! scoped stub-file lifecycle with guaranteed cleanup ([`provision`]).

pub mod locate;
pub mod process;
pub mod provision;

pub use locate::{LocateError, installed_location, parse_location};
pub use process::{RunError, run, run_sequence};
pub use provision::{ProvisionError, StubGuard, provision, search_path_value};
