/*!
 * Workflow steps and the transition table.
 *
 * The workflow is strictly linear. `current_step` on a task names the next
 * step to run; `Completed` is the terminal marker and runs nothing.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of the translation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Create one progress record per chapter draft
    Segmenting,
    /// Review titles and apply auto-fixes
    AnalyzingTitles,
    /// Batch-translate chapter titles
    TranslatingTitles,
    /// Translate chapter bodies one at a time
    TranslatingBodies,
    /// Deterministic checks on translated bodies
    QualityChecking,
    /// Promote ready chapters into the catalog
    Importing,
    /// Nothing left to run
    Completed,
}

/// `(step, next)` pairs; every step has exactly one successor
pub const TRANSITIONS: &[(WorkflowStep, WorkflowStep)] = &[
    (WorkflowStep::Segmenting, WorkflowStep::AnalyzingTitles),
    (WorkflowStep::AnalyzingTitles, WorkflowStep::TranslatingTitles),
    (WorkflowStep::TranslatingTitles, WorkflowStep::TranslatingBodies),
    (WorkflowStep::TranslatingBodies, WorkflowStep::QualityChecking),
    (WorkflowStep::QualityChecking, WorkflowStep::Importing),
    (WorkflowStep::Importing, WorkflowStep::Completed),
];

impl WorkflowStep {
    /// First step of a fresh task
    pub const FIRST: WorkflowStep = WorkflowStep::Segmenting;

    /// Step that follows this one, `None` for `Completed`
    pub fn next_step(self) -> Option<WorkflowStep> {
        TRANSITIONS.iter().find(|(from, _)| *from == self).map(|(_, to)| *to)
    }

    /// Whether this is the terminal marker
    pub fn is_terminal(self) -> bool {
        self == WorkflowStep::Completed
    }

    /// Storage string
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::Segmenting => "segmenting",
            WorkflowStep::AnalyzingTitles => "analyzing_titles",
            WorkflowStep::TranslatingTitles => "translating_titles",
            WorkflowStep::TranslatingBodies => "translating_bodies",
            WorkflowStep::QualityChecking => "quality_checking",
            WorkflowStep::Importing => "importing",
            WorkflowStep::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "segmenting" => Ok(WorkflowStep::Segmenting),
            "analyzing_titles" => Ok(WorkflowStep::AnalyzingTitles),
            "translating_titles" => Ok(WorkflowStep::TranslatingTitles),
            "translating_bodies" => Ok(WorkflowStep::TranslatingBodies),
            "quality_checking" => Ok(WorkflowStep::QualityChecking),
            "importing" => Ok(WorkflowStep::Importing),
            "completed" => Ok(WorkflowStep::Completed),
            _ => Err(anyhow::anyhow!("Invalid workflow step: {}", s)),
        }
    }
}
