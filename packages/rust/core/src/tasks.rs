//! Named tasks and their expansion into an ordered step plan.

use std::fmt;

/// A task invocable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Styles,
    Html,
    CopyStaging,
    CopyStatic,
    Clean,
    Server,
    Dev,
    Build,
    Amp,
    Qa,
}

impl Task {
    pub const ALL: [Task; 10] = [
        Task::Styles,
        Task::Html,
        Task::CopyStaging,
        Task::CopyStatic,
        Task::Clean,
        Task::Server,
        Task::Dev,
        Task::Build,
        Task::Amp,
        Task::Qa,
    ];

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Task::Styles => "styles",
            Task::Html => "html",
            Task::CopyStaging => "copy:tmp",
            Task::CopyStatic => "copy:static",
            Task::Clean => "clean",
            Task::Server => "server",
            Task::Dev => "dev",
            Task::Build => "build",
            Task::Amp => "amp",
            Task::Qa => "qa",
        }
    }

    pub fn from_name(name: &str) -> Option<Task> {
        Task::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Steps this task runs, prerequisites first.
    fn steps(self) -> Vec<Step> {
        match self {
            Task::Styles => vec![Step::Styles],
            Task::Html => vec![Step::Html],
            Task::CopyStaging => vec![Step::CopyStaging],
            Task::CopyStatic => vec![Step::CopyStatic],
            Task::Clean => vec![Step::Clean],
            Task::Server => vec![Step::Serve],
            Task::Dev => vec![
                Step::CopyStaging,
                Step::Styles,
                Step::Html,
                Step::ServeAndWatch,
            ],
            Task::Build => vec![
                Step::Clean,
                Step::CopyStaging,
                Step::Styles,
                Step::Html,
                Step::CopyStatic,
            ],
            Task::Amp | Task::Qa => {
                let mut steps = Task::Build.steps();
                steps.push(Step::Validate);
                steps
            }
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Clean,
    CopyStaging,
    Styles,
    Html,
    CopyStatic,
    Validate,
    Serve,
    ServeAndWatch,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::Clean => "clean",
            Step::CopyStaging => "copy:tmp",
            Step::Styles => "styles",
            Step::Html => "html",
            Step::CopyStatic => "copy:static",
            Step::Validate => "amp",
            Step::Serve => "server",
            Step::ServeAndWatch => "server+watch",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expand tasks into a linear plan. Each step runs at most once, at the
/// position of its first occurrence.
pub fn plan(tasks: &[Task]) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    for step in tasks.iter().flat_map(|t| t.steps()) {
        if !steps.contains(&step) {
            steps.push(step);
        }
    }
    steps
}
