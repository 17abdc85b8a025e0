// Numan Thabit 2025
use std::io::Write;

use crate::{config::EndpointSpec, error::RenderError};

use super::{verdict, CLOSING, METHOD, PREAMBLE, TITLE};

/// Human-readable report: banner, explanation, then each endpoint's
/// statistics block.
pub fn write_text<W: Write>(w: &mut W, endpoints: &[EndpointSpec]) -> Result<(), RenderError> {
    let rule = "=".repeat(TITLE.len());
    writeln!(w, "{rule}\n{TITLE}\n{rule}\n")?;
    writeln!(w, "{PREAMBLE}\n")?;
    writeln!(w, "{METHOD}\n")?;

    for endpoint in endpoints {
        writeln!(w, "API Endpoint: {}", endpoint.target.url)?;
        if let Some(metrics) = &endpoint.metrics {
            metrics.write_text(w)?;
        }
        writeln!(w, "{}\n", verdict(endpoint))?;
    }

    writeln!(w, "{CLOSING}")?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::probed;

    #[test]
    fn text_report_lists_endpoints_in_order() {
        let endpoints = [probed("http://a/", 10), probed("http://b/", 500)];
        let mut out = Vec::new();
        write_text(&mut out, &endpoints).expect("text report");
        let out = String::from_utf8(out).expect("utf8");

        assert!(out.starts_with("====="));
        let a = out.find("API Endpoint: http://a/").expect("endpoint a");
        let b = out.find("API Endpoint: http://b/").expect("endpoint b");
        assert!(a < b);
        assert_eq!(out.matches("Latencies     [min, mean").count(), 2);
        assert!(out.trim_end().ends_with(CLOSING));
    }
}
