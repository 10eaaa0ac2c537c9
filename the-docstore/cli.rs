use std::path::PathBuf;

use anyhow::{
  Result,
  anyhow,
};
use clap::{
  ArgAction,
  Parser,
  Subcommand,
};
use the_lib::{
  Eol,
  encoding::TextEncoding,
};

#[derive(Parser, Debug)]
#[command(name = "the-docstore", about, version, long_about = None)]
pub struct Cli {
  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count, global = true)]
  pub verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE", global = true)]
  pub log_file: Option<PathBuf>,

  /// Load store configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
  pub config_file: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show the detected format of a file
  Inspect {
    file: PathBuf,
    /// Decode with this encoding instead of detecting it
    #[arg(short = 'e', long, value_parser = parse_encoding)]
    encoding: Option<TextEncoding>,
  },
  /// Re-encode a file
  Convert {
    src: PathBuf,
    dst: PathBuf,
    /// Source encoding, detected when absent
    #[arg(long, value_parser = parse_encoding)]
    from: Option<TextEncoding>,
    /// Target encoding, the source's when absent
    #[arg(long, value_parser = parse_encoding)]
    to: Option<TextEncoding>,
    /// Line terminator: lf, crlf or cr
    #[arg(long, value_parser = parse_eol)]
    eol: Option<Eol>,
    /// Write a byte-order mark
    #[arg(long, conflicts_with = "no_bom")]
    bom: bool,
    /// Do not write a byte-order mark
    #[arg(long)]
    no_bom: bool,
  },
  /// Print every match of a pattern
  Search {
    file: PathBuf,
    pattern: String,
    /// Treat the pattern as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,
    #[arg(short = 'i', long)]
    ignore_case: bool,
  },
  /// List the lines of NEW that differ from OLD
  Diff { old: PathBuf, new: PathBuf },
}

fn parse_encoding(value: &str) -> Result<TextEncoding> {
  TextEncoding::for_label(value).ok_or_else(|| anyhow!("unknown encoding {value:?}"))
}

fn parse_eol(value: &str) -> Result<Eol> {
  Eol::from_property_name(value)
    .or_else(|| value.parse().ok())
    .ok_or_else(|| anyhow!("unknown line terminator {value:?}"))
}
