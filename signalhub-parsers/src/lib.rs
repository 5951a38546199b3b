//! The Parser Registry (spec §4.J): stateless line parsers for the common
//! producer formats, plus autodetection for producers that submit raw text
//! without declaring a format.

mod apache;
mod error;
mod generic;
mod json;
mod nginx;
mod parser;
mod registry;
mod syslog;

pub use apache::{ApacheCombinedParser, ApacheCommonParser};
pub use error::{ParseError, ParseResult};
pub use generic::GenericParser;
pub use json::JsonParser;
pub use nginx::NginxParser;
pub use parser::LineParser;
pub use registry::{ParseOutcome, ParserRegistry};
pub use syslog::SyslogParser;
