/// Human-readable check output
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Action,
    Success,
    Failure,
}

impl LineKind {
    fn symbol(self) -> &'static str {
        match self {
            LineKind::Action => "►",
            LineKind::Success => "✔",
            LineKind::Failure => "✗",
        }
    }
}

/// Sink for the action/success/failure lines a check run produces
pub trait Reporter: Send + Sync {
    fn line(&self, kind: LineKind, message: &str);

    fn action(&self, message: &str) {
        self.line(LineKind::Action, message)
    }

    fn success(&self, message: &str) {
        self.line(LineKind::Success, message)
    }

    fn failure(&self, message: &str) {
        self.line(LineKind::Failure, message)
    }
}

/// Prints report lines to stdout
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn line(&self, kind: LineKind, message: &str) {
        debug!(?kind, "{}", message);
        println!("{} {}", kind.symbol(), message);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every line for assertions
    #[derive(Default)]
    pub struct RecordingReporter {
        lines: Mutex<Vec<(LineKind, String)>>,
    }

    impl RecordingReporter {
        pub fn lines(&self) -> Vec<(LineKind, String)> {
            self.lines.lock().unwrap().clone()
        }

        pub fn of(&self, kind: LineKind) -> Vec<String> {
            self.lines()
                .into_iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, message)| message)
                .collect()
        }
    }

    impl Reporter for RecordingReporter {
        fn line(&self, kind: LineKind, message: &str) {
            self.lines.lock().unwrap().push((kind, message.to_string()));
        }
    }

    #[test]
    fn test_default_methods_tag_lines() {
        let reporter = RecordingReporter::default();
        reporter.action("checking prerequisites");
        reporter.success("kubectl 1.29.2 >=1.18.0");
        reporter.failure("Kubernetes version must be >=1.16.0");

        assert_eq!(
            reporter.lines(),
            vec![
                (LineKind::Action, "checking prerequisites".to_string()),
                (LineKind::Success, "kubectl 1.29.2 >=1.18.0".to_string()),
                (
                    LineKind::Failure,
                    "Kubernetes version must be >=1.16.0".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_symbols() {
        assert_eq!(LineKind::Action.symbol(), "►");
        assert_eq!(LineKind::Success.symbol(), "✔");
        assert_eq!(LineKind::Failure.symbol(), "✗");
    }
}
