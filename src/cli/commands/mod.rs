//! One module per subcommand, each exposing `execute`.

pub mod analyze;
pub mod babysit;
pub mod cleanup;
pub mod inspect;
pub mod status;
pub mod worker;
