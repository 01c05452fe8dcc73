//! The accumulating diagnostic sink. Every compilation phase writes into a
//! [Reporter]; a single diagnostic does not halt the enclosing phase, but
//! [`Reporter::validate`] at each phase end aborts the overall compile if
//! any error was recorded.

use ember_source::SourceLocation;
use ember_utils::log;

use crate::report::{Report, ReportKind};

#[derive(Debug, Default)]
pub struct Reporter {
    reports: Vec<Report>,
    error_count: usize,
    fatal: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished [Report].
    pub fn add(&mut self, report: Report) {
        if self.fatal {
            // A fatal diagnostic already short-circuited this compile.
            return;
        }

        if report.is_error() {
            self.error_count += 1;
        }
        if report.kind == ReportKind::Fatal {
            self.fatal = true;
        }

        log::debug!("report: {}", report.title);
        self.reports.push(report);
    }

    /// Record a plain error with a single primary span.
    pub fn error(&mut self, title: impl ToString, location: SourceLocation) -> &mut Report {
        self.report(ReportKind::Error, title, location)
    }

    /// Record a fatal error; subsequent reports are dropped.
    pub fn fatal(&mut self, title: impl ToString, location: SourceLocation) -> &mut Report {
        self.report(ReportKind::Fatal, title, location)
    }

    /// Record an internal invariant violation.
    pub fn internal(&mut self, title: impl ToString, location: SourceLocation) -> &mut Report {
        self.report(ReportKind::Internal, title, location)
    }

    fn report(
        &mut self,
        kind: ReportKind,
        title: impl ToString,
        location: SourceLocation,
    ) -> &mut Report {
        let mut report = Report::new();
        report.kind(kind).title(title).add_span(location);
        self.add(report);

        // The freshly-pushed report, so callers can chain continued spans and
        // notes onto it. When a fatal report already swallowed this one, hand
        // back the last live report instead.
        self.reports.last_mut().expect("reporter has no reports")
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal
    }

    /// Phase-end check: `true` when the compile may continue.
    pub fn validate(&self) -> bool {
        self.error_count == 0
    }
}

#[cfg(test)]
mod tests {
    use ember_source::{SourceLocation, Span};

    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(Span::empty(), 0usize.into())
    }

    #[test]
    fn errors_fail_validation() {
        let mut reporter = Reporter::new();
        assert!(reporter.validate());

        reporter.error("label is unreachable", loc());
        assert!(!reporter.validate());
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn fatal_short_circuits() {
        let mut reporter = Reporter::new();
        reporter.fatal("recursion limit exceeded", loc());
        reporter.error("subsequent error", loc());

        // Only the fatal report survives.
        assert_eq!(reporter.reports().len(), 1);
        assert!(reporter.has_fatal());
    }
}
