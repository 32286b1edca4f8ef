//! CDX-JSON index records and the streaming parser that admits them.

mod parser;
mod record;

pub use parser::{FileReport, ParseOutcome, RecordStreamParser};
pub use record::{parse_line, IndexRecord, LineError, STATUS_OK};
