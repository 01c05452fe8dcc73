//! Terminal rendering of accumulated reports: `path:row:col: kind: message`
//! lines, "continued" annotations for secondary spans, indented notes, and
//! the closing footer when compilation stops.

use std::io::{self, Write};

use ember_source::SourceMap;

use crate::{
    highlight::{highlight, Colour, Modifier},
    report::{Report, ReportElement},
    reporter::Reporter,
};

/// Write a single [Report] to `out`.
pub fn write_report(report: &Report, sources: &SourceMap, out: &mut impl Write) -> io::Result<()> {
    let mut primary_seen = false;

    for element in &report.contents {
        match element {
            ReportElement::CodeBlock(block) => {
                let where_ = sources.describe(block.location);
                if !primary_seen {
                    primary_seen = true;
                    if block.code_message.is_empty() {
                        writeln!(out, "{where_}: {}: {}", report.kind, report.title)?;
                    } else {
                        writeln!(
                            out,
                            "{where_}: {}: {} ({})",
                            report.kind, report.title, block.code_message
                        )?;
                    }
                } else if block.code_message.is_empty() {
                    writeln!(out, "{where_}: (continued)")?;
                } else {
                    writeln!(out, "{where_}: (continued) {}", block.code_message)?;
                }
            }
            ReportElement::Note(note) => {
                writeln!(out, "  {}: {}", note.label, note.message)?;
            }
        }
    }

    // Reports synthesized without any span still need their title printed.
    if !primary_seen {
        writeln!(out, "{}: {}", report.kind, report.title)?;
    }

    Ok(())
}

/// Write every accumulated report, plus the stopping footer when any error
/// was recorded.
pub fn write_all(reporter: &Reporter, sources: &SourceMap, out: &mut impl Write) -> io::Result<()> {
    for report in reporter.reports() {
        write_report(report, sources, out)?;
    }

    if !reporter.validate() {
        writeln!(
            out,
            "{}",
            highlight(Colour::Red | Modifier::Bold, "stopping compilation due to previous error")
        )?;
    }

    Ok(())
}
