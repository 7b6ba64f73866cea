mod common;
mod init;
mod normalize;
mod validate;

pub use init::{InitArgs, init_config};
pub use normalize::{NormalizeArgs, normalize_runs};
pub use validate::{ValidateArgs, validate_config};
