//! Certificate ledger types

mod caller;
mod health;
mod history;
mod record;
mod verification;

pub use caller::*;
pub use health::*;
pub use history::*;
pub use record::*;
pub use verification::*;
