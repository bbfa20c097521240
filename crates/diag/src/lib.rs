//! Error reporting
//!
//! The entrypoint to this module is [`Report`].

mod report;
mod source;

pub use report::{EmitError, Level, Report};
pub use source::Source;
