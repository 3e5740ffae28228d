//! engine::feedback
//!
//! Where batch operations send their failures.
//!
//! A batch keeps going after a project fails, so failures cannot be returned
//! one at a time. Every failure is handed to a caller-supplied
//! [`FeedbackSink`] together with the [`Stage`] it happened in. Compiler
//! diagnostics go through the same sink.
//!
//! # Example
//!
//! ```
//! use reloadkit::engine::error::{ProjectError, Stage};
//! use reloadkit::engine::feedback::FeedbackSink;
//!
//! let mut seen = Vec::new();
//! let mut sink = |stage: Stage, error: ProjectError| seen.push((stage, error.to_string()));
//! sink.report(Stage::Load, ProjectError::UnknownProject("ghost".into()));
//! assert_eq!(seen.len(), 1);
//! ```

use super::error::{ProjectError, Stage};
use crate::core::types::ProjectName;

/// Receives failures and compiler output from orchestration.
pub trait FeedbackSink {
    /// Report a failure.
    fn report(&mut self, stage: Stage, error: ProjectError);

    /// Receive a diagnostic line from the compiler. Ignored by default.
    fn compiler_output(&mut self, project: &ProjectName, message: &str) {
        let _ = (project, message);
    }
}

impl<F> FeedbackSink for F
where
    F: FnMut(Stage, ProjectError),
{
    fn report(&mut self, stage: Stage, error: ProjectError) {
        self(stage, error)
    }
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl FeedbackSink for Discard {
    fn report(&mut self, _stage: Stage, _error: ProjectError) {}
}

/// A sink that records everything, in order.
#[derive(Debug, Default, Clone)]
pub struct CollectedFeedback {
    /// Reported failures.
    pub reports: Vec<(Stage, ProjectError)>,
    /// Compiler output lines.
    pub compiler_output: Vec<(ProjectName, String)>,
}

impl CollectedFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Failures attributed to `project`.
    pub fn errors_for<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a ProjectError> {
        self.reports
            .iter()
            .filter(move |(_, e)| e.project().map(ProjectName::as_str) == Some(project))
            .map(|(_, e)| e)
    }

    /// Failures reported in `stage`.
    pub fn in_stage(&self, stage: Stage) -> impl Iterator<Item = &ProjectError> {
        self.reports
            .iter()
            .filter(move |(s, _)| *s == stage)
            .map(|(_, e)| e)
    }

    /// Every failure rendered as `[stage] project: message`.
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .iter()
            .map(|(stage, error)| match error.project() {
                Some(project) => format!("[{stage}] {project}: {error}"),
                None => format!("[{stage}] {error}"),
            })
            .collect()
    }
}

impl FeedbackSink for CollectedFeedback {
    fn report(&mut self, stage: Stage, error: ProjectError) {
        self.reports.push((stage, error));
    }

    fn compiler_output(&mut self, project: &ProjectName, message: &str) {
        self.compiler_output
            .push((project.clone(), message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ProjectName {
        ProjectName::new(s).unwrap()
    }

    #[test]
    fn closure_sink_receives_reports() {
        let mut stages = Vec::new();
        {
            let mut sink = |stage: Stage, _error: ProjectError| stages.push(stage);
            let sink: &mut dyn FeedbackSink = &mut sink;
            sink.report(Stage::Compile, ProjectError::UnknownProject("x".into()));
            sink.compiler_output(&name("x"), "ignored");
        }
        assert_eq!(stages, vec![Stage::Compile]);
    }

    #[test]
    fn collected_feedback_filters() {
        let mut feedback = CollectedFeedback::new();
        assert!(feedback.is_empty());

        feedback.report(
            Stage::Load,
            ProjectError::SelfDependency { project: name("a") },
        );
        feedback.report(
            Stage::Compile,
            ProjectError::Compile {
                project: name("b"),
                message: "syntax error".into(),
            },
        );
        feedback.report(Stage::Load, ProjectError::Discovery("denied".into()));
        feedback.compiler_output(&name("b"), "line 3: expected ';'");

        assert_eq!(feedback.errors_for("a").count(), 1);
        assert_eq!(feedback.errors_for("b").count(), 1);
        assert_eq!(feedback.in_stage(Stage::Load).count(), 2);
        assert_eq!(feedback.compiler_output.len(), 1);
        assert_eq!(
            feedback.messages(),
            vec![
                "[load] a: project depends on itself (circular dependency): a".to_string(),
                "[compile] b: failed to compile project 'b': syntax error".to_string(),
                "[load] failed to discover projects: denied".to_string(),
            ]
        );
    }
}
