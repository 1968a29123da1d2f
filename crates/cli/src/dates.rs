//! Date window from flags, or from stdin when a flag is missing.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use urbanlens_cloud::{parse_date, DateWindow};

/// Ask for a `YYYY-MM-DD` date until one parses.
pub fn prompt_date<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> Result<NaiveDate> {
    loop {
        write!(output, "Enter {} date (YYYY-MM-DD): ", label)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("No {} date given", label);
        }
        match parse_date(&line) {
            Ok(date) => return Ok(date),
            Err(_) => writeln!(output, "Invalid format.")?,
        }
    }
}

/// Build the search window; missing ends are read from `input`.
pub fn resolve_window<R: BufRead, W: Write>(
    start: Option<&str>,
    end: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> Result<DateWindow> {
    let start = match start {
        Some(s) => parse_date(s).context("Invalid --start")?,
        None => prompt_date(input, output, "start")?,
    };
    let end = match end {
        Some(s) => parse_date(s).context("Invalid --end")?,
        None => prompt_date(input, output, "end")?,
    };
    Ok(DateWindow::new(start, end)?)
}
