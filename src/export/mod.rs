pub mod csv;
pub mod report;

pub use csv::{export_csv, export_csv_file};
pub use report::generate_report;

use anyhow::Result;
use std::io::Write;

use crate::state::Session;

/// Export session to pretty-printed JSON
pub fn export_json<W: Write>(session: &Session, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, session)?;
    Ok(())
}
