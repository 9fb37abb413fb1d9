//! Printing batch results as they arrive.

use std::io::Write;

use crate::batch::{FailureStream, SuccessStream};

/// Counts of what was printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintStats {
    pub successes: usize,
    pub failures: usize,
}

/// Drain both streams in one loop, printing payloads as text and failures by their
/// error message.
///
/// The loop exits on the success stream's end (the completion signal). Failures still
/// buffered at that point are printed afterwards rather than lost.
pub async fn print_outcomes<W: Write>(
    mut successes: SuccessStream,
    mut failures: FailureStream,
    out: &mut W,
) -> std::io::Result<PrintStats> {
    let mut stats = PrintStats::default();

    loop {
        tokio::select! {
            success = successes.recv() => match success {
                Some((_, body)) => {
                    writeln!(out, "{}", String::from_utf8_lossy(&body))?;
                    stats.successes += 1;
                }
                None => break,
            },
            Some((id, e)) = failures.recv() => {
                writeln!(out, "request {id} failed: {e}")?;
                stats.failures += 1;
            }
        }
    }

    while let Some((id, e)) = failures.recv().await {
        writeln!(out, "request {id} failed: {e}")?;
        stats.failures += 1;
    }

    out.flush()?;
    Ok(stats)
}
