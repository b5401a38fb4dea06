mod admin;
mod context;
mod issue;
mod renew_due;
mod serve;

pub use admin::{MarkBrokenCommand, ResetCommand};
pub use issue::IssueCommand;
pub use renew_due::RenewDueCommand;
pub use serve::ServeCommand;
