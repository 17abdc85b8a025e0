// Numan Thabit 2025
use std::path::PathBuf;

use clap::Parser;

use crate::{config::InputSource, error::ConfigError};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "rtapi",
    author,
    version,
    about = "Real time API latency analyzer"
)]
pub struct CliArgs {
    /// Endpoint list as a .json, .yml or .yaml file.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Endpoint list as an inline JSON document.
    #[arg(short = 'd', long = "data", value_name = "JSON")]
    pub data: Option<String>,

    /// Write a PDF report with the latency graph to this path.
    #[arg(short = 'o', long = "output", value_name = "PDF")]
    pub output: Option<PathBuf>,

    /// Print the text report to stdout.
    #[arg(short = 'p', long = "print")]
    pub print: bool,

    /// Print the JSON report to stdout.
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Forwarding sink settings: a .json/.yml/.yaml file or an inline JSON
    /// document with url, authkey and source.
    #[arg(short = 's', long = "splunk", value_name = "SETTINGS", env = "RTAPI_SPLUNK")]
    pub splunk: Option<String>,

    /// Hide the progress bar.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Emitters requested for this invocation, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSelection {
    pub print: bool,
    pub pdf: Option<PathBuf>,
    pub json: bool,
    pub splunk: Option<String>,
}

impl CliArgs {
    pub fn input_source(&self) -> Result<InputSource, ConfigError> {
        InputSource::from_parts(self.file.clone(), self.data.clone())
    }

    /// Fails when no emitter was selected.
    pub fn outputs(&self) -> Result<OutputSelection, ConfigError> {
        let selection = OutputSelection {
            print: self.print,
            pdf: self.output.clone(),
            json: self.json,
            splunk: self.splunk.clone(),
        };
        if selection.is_empty() {
            return Err(ConfigError::NoOutput);
        }
        Ok(selection)
    }
}

impl OutputSelection {
    pub fn is_empty(&self) -> bool {
        !self.print && self.pdf.is_none() && !self.json && self.splunk.is_none()
    }
}
