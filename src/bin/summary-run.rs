//! CLI tool to query summary files.
//!
//! Usage:
//!   summary-run <summary.dat> [query.q]
//!   summary-run <summary.dat> -e "FILTER temperature > 0.4" -e "SORT mobility DESC"
//!   summary-run <summary.dat> --columns
//!
//! Without a query, prints the whole table. Writes to stdout unless
//! `-o` is given.

use clap::Parser;
use log::{LevelFilter, debug};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use summary_rs::{FormatConfig, SummaryParser, execute_query};

/// Query a fixed-width simulation summary file.
#[derive(Parser)]
#[command(name = "summary-run")]
struct Cli {
    /// Summary file (fixed-width columns)
    summary: String,

    /// Query script file (one command per line)
    query: Option<String>,

    /// Inline query command; may be repeated, runs after the script file
    #[arg(short, long = "execute")]
    execute: Vec<String>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Print the column names and types, then exit
    #[arg(long)]
    columns: bool,

    /// Read the legacy layout (18-char columns, names line only)
    #[arg(long)]
    legacy: bool,

    /// Override the column width
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    col_width: Option<u16>,

    /// Only read the first N columns
    #[arg(long)]
    max_columns: Option<usize>,

    /// Expected format version
    #[arg(long)]
    expect_version: Option<f64>,

    /// Show paths, record counts and debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn format_config(&self) -> FormatConfig {
        let mut config = if self.legacy {
            FormatConfig::legacy()
        } else {
            FormatConfig::v2()
        };
        if let Some(width) = self.col_width {
            config = config.with_col_width(usize::from(width));
        }
        if let Some(n) = self.max_columns {
            config = config.with_max_columns(n);
        }
        if let Some(version) = self.expect_version {
            config = config.with_version(version);
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .init();
}

/// Write the rendered result to `path`, creating its directory, or to
/// stdout with a trailing newline.
fn write_output(output: &str, path: Option<&str>) -> io::Result<()> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        if !output.is_empty() && !output.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        return stdout.flush();
    };
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, output)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.format_config();
    debug!("Format: {config:?}");

    let summary_text = match fs::read_to_string(&cli.summary) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading summary file '{}': {e}", cli.summary);
            process::exit(1);
        }
    };

    if cli.columns {
        let mut parser = SummaryParser::with_config(config);
        if let Err(e) = parser.read_str(&summary_text) {
            eprintln!("Summary error: {e}");
            process::exit(1);
        }
        if let Some(dataset) = parser.dataset() {
            for col in dataset.schema().columns() {
                println!("{:<width$}{}", col.name, col.column_type, width = col.byte_width);
            }
        }
        return;
    }

    let mut script = match &cli.query {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading query file '{path}': {e}");
                process::exit(1);
            }
        },
        None => String::new(),
    };
    for cmd in &cli.execute {
        script.push('\n');
        script.push_str(cmd);
    }

    if cli.verbose {
        eprintln!("Summary: {}", cli.summary);
        eprintln!("Query:   {}", cli.query.as_deref().unwrap_or("(inline)"));
        eprintln!("Output:  {}", cli.output.as_deref().unwrap_or("(stdout)"));
    }

    match execute_query(&summary_text, &script, &config) {
        Ok((output, input_count, output_count)) => {
            if let Err(e) = write_output(&output, cli.output.as_deref()) {
                eprintln!(
                    "Error writing result to {}: {e}",
                    cli.output.as_deref().unwrap_or("stdout")
                );
                process::exit(1);
            }
            if cli.verbose {
                eprintln!("Rows:    {input_count} in -> {output_count} out");
            }
        }
        Err(e) => {
            eprintln!("Query error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_output_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("hot.txt");
        let path = path.to_str().unwrap();

        write_output("#random_seed\n1002", Some(path)).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "#random_seed\n1002");
    }
}
