// Numan Thabit 2025
use std::io::Write;

use crate::{config::EndpointSpec, error::RenderError};

/// The enriched endpoint list as a single-line JSON array.
pub fn write_json<W: Write>(w: &mut W, endpoints: &[EndpointSpec]) -> Result<(), RenderError> {
    serde_json::to_writer(&mut *w, endpoints)?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}
