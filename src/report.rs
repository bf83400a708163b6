//! Tab-delimited result files.
//!
//! Every file is first written to a temporary file in its destination directory and then renamed into place, so a
//! failed write never leaves a truncated file behind and never touches the files of other cells.

use crate::sweep::{SweepCell, SweepResult};
use crate::trials::{TraceRun, TrialSummaryBatch};
use crate::{Error, Result};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the summary table written by [`write_sweep()`].
pub const SUMMARY_FILE_NAME: &str = "voteCombos.txt";

/// Format `value` like C's `%g`: six significant digits, trailing zeros removed, and scientific notation for very
/// large or very small magnitudes.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_owned();
    }

    // the exponent after rounding decides between fixed and scientific notation
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..PRECISION).contains(&exponent) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exponent) as usize, value);
        trim_fraction(&fixed).to_owned()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// File name holding the raw trial summaries of `cell`, encoding its service time, machine count, and voters per
/// machine.
pub fn cell_file_name(cell: &SweepCell) -> String {
    format!(
        "dat_{}_{}_{}.txt",
        format_g(cell.params.service_time),
        cell.params.machines,
        cell.params.voters_per_machine
    )
}

/// Write one row per trial, `max_wait<TAB>last_departure`, to `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written. No partial file is left at `path`.
pub fn write_batch(path: &Path, batch: &TrialSummaryBatch) -> Result<()> {
    write_atomically(path, |out| {
        for summary in batch.iter() {
            writeln!(out, "{}\t{}", format_g(summary.max_wait), format_g(summary.last_departure))?;
        }
        Ok(())
    })
}

/// Write the raw trial summaries of `cell` into `dir`, returning the path of the new file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_cell(dir: &Path, cell: &SweepCell) -> Result<PathBuf> {
    let path = dir.join(cell_file_name(cell));
    write_batch(&path, &cell.batch)?;
    Ok(path)
}

/// Write the summary table of a sweep into `dir`: a header naming the grid axes and one `>threshold` column per
/// threshold, followed by one row per cell in grid order.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_summary(dir: &Path, result: &SweepResult) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_FILE_NAME);
    write_atomically(&path, |out| {
        write!(out, "machineTime\tnumMachines\tvotersPerMachine")?;
        for &threshold in &result.thresholds {
            write!(out, "\t>{}", format_g(threshold))?;
        }
        writeln!(out)?;

        for cell in &result.cells {
            write!(
                out,
                "{}\t{}\t{}",
                format_g(cell.params.service_time),
                cell.params.machines,
                cell.params.voters_per_machine
            )?;
            for &fraction in &cell.exceedance {
                write!(out, "\t{}", format_g(fraction))?;
            }
            writeln!(out)?;
        }
        Ok(())
    })?;
    Ok(path)
}

/// Create the output directory of a sweep, along with any missing parents.
///
/// # Errors
///
/// Returns [`Error::Io`] carrying `dir` if it cannot be created.
pub fn create_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

/// Write every cell file and the summary table of a finished sweep into `dir`, creating it if necessary.
///
/// To save cells while the sweep is still running, pass [`write_cell()`] to [`Sweep::run_with()`] and call
/// [`write_summary()`] at the end instead.
///
/// # Errors
///
/// Returns [`Error::Io`] for the first file or directory that cannot be written. Files already written for earlier
/// cells are left intact.
///
/// [`Sweep::run_with()`]: crate::Sweep::run_with
pub fn write_sweep(dir: &Path, result: &SweepResult) -> Result<PathBuf> {
    create_output_dir(dir)?;

    for cell in &result.cells {
        write_cell(dir, cell)?;
    }
    let summary = write_summary(dir, result)?;
    info!("Wrote {} cell files and {} to {}", result.cells.len(), SUMMARY_FILE_NAME, dir.display());

    Ok(summary)
}

/// Write traced trials as `run<TAB>arrival<TAB>wait` rows, one per voter, to `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_trace(path: &Path, runs: &[TraceRun]) -> Result<()> {
    write_atomically(path, |out| write_trace_rows(out, runs))
}

/// Write traced trials in the same layout as [`write_trace()`] to any writer, e.g. standard output.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_trace_rows<W: Write + ?Sized>(out: &mut W, runs: &[TraceRun]) -> io::Result<()> {
    writeln!(out, "run\tarrival\twait")?;
    for (run, trace) in runs.iter().enumerate() {
        for (&arrival, &wait) in trace.arrivals.times().iter().zip(trace.outcome.wait_times()) {
            writeln!(out, "{}\t{}\t{}", run, format_g(arrival), format_g(wait))?;
        }
    }
    Ok(())
}

fn write_atomically<F>(path: &Path, contents: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(path, e))?;
    {
        let mut out = BufWriter::new(file.as_file_mut());
        contents(&mut out).and_then(|()| out.flush()).map_err(|e| Error::io(path, e))?;
    }
    file.persist(path).map_err(|e| Error::io(path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::CellParams;
    use crate::trials::TrialSummary;

    fn cell(service_time: f64, machines: usize, voters_per_machine: u32, waits: &[f64]) -> SweepCell {
        let batch: TrialSummaryBatch = waits
            .iter()
            .map(|&max_wait| TrialSummary {
                max_wait,
                last_departure: 780.0 + max_wait,
            })
            .collect();
        let exceedance = batch.exceedance_fractions(&[15.0, 30.0]);
        SweepCell {
            params: CellParams {
                index: 0,
                service_time,
                machines,
                voters_per_machine,
            },
            batch,
            exceedance,
        }
    }

    #[test]
    fn format_g_matches_c_printf() {
        let cases = [
            (0.0, "0"),
            (5.0, "5"),
            (2.5, "2.5"),
            (-3.5, "-3.5"),
            (0.1, "0.1"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (123.456789, "123.457"),
            (100000.0, "100000"),
            (1234567.0, "1.23457e+06"),
            (999999.5, "1e+06"),
            (786.123456, "786.123"),
            (1e100, "1e+100"),
        ];
        for (value, expected) in cases {
            assert_eq!(expected, format_g(value), "formatting {value}");
        }
    }

    #[test]
    fn cell_file_name_encodes_parameters() {
        assert_eq!("dat_5_10_150.txt", cell_file_name(&cell(5.0, 10, 150, &[])));
        assert_eq!("dat_7.5_2_50.txt", cell_file_name(&cell(7.5, 2, 50, &[])));
    }

    #[test]
    fn cell_file_has_one_row_per_trial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cell(dir.path(), &cell(2.0, 5, 100, &[0.0, 12.5, 40.0])).unwrap();

        let written = fs::read_to_string(path).unwrap();
        assert_eq!("0\t780\n12.5\t792.5\n40\t820\n", written);
    }

    #[test]
    fn summary_lists_cells_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let result = SweepResult {
            thresholds: vec![15.0, 30.0],
            cells: vec![cell(2.0, 5, 100, &[0.0, 20.0]), cell(2.0, 10, 50, &[50.0, 50.0, 0.0, 0.0])],
        };

        let path = write_sweep(dir.path(), &result).unwrap();
        assert_eq!(SUMMARY_FILE_NAME, path.file_name().unwrap());

        let written = fs::read_to_string(path).unwrap();
        let expected = "machineTime\tnumMachines\tvotersPerMachine\t>15\t>30\n\
                        2\t5\t100\t0.5\t0\n\
                        2\t10\t50\t0.5\t0.5\n";
        assert_eq!(expected, written);
        assert!(dir.path().join("dat_2_5_100.txt").exists());
        assert!(dir.path().join("dat_2_10_50.txt").exists());
    }

    #[test]
    fn missing_directory_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent").join("dat.txt");

        let err = write_batch(&missing, &TrialSummaryBatch::default()).unwrap_err();
        match err {
            Error::Io { path, .. } => assert_eq!(missing, path),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!missing.exists());
    }

    #[test]
    fn failed_write_keeps_the_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE_NAME);
        fs::write(&path, "keep").unwrap();

        let err = write_atomically(&path, |out| {
            out.write_all(b"partial")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();
        match err {
            Error::Io { path: failed, .. } => assert_eq!(path, failed),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!("keep", fs::read_to_string(&path).unwrap());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|entry| entry.unwrap().path()).collect();
        assert_eq!(vec![path], entries, "temporary file left behind");
    }

    #[test]
    fn sweep_output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("runs").join("today");
        let result = SweepResult {
            thresholds: vec![15.0],
            cells: Vec::new(),
        };

        write_sweep(&nested, &result).unwrap();
        assert!(nested.join(SUMMARY_FILE_NAME).exists());
    }
}
