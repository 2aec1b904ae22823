use std::fmt;

/// Artifact family a pipeline is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineKind {
    Js,
    Css,
    Concat,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Js => f.write_str("js"),
            PipelineKind::Css => f.write_str("css"),
            PipelineKind::Concat => f.write_str("concat"),
        }
    }
}

/// Flags shared by every pipeline of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFlags {
    /// Run the compressor over every artifact.
    pub production: bool,
    /// Keep the process alive and rebuild on change.
    pub watch: bool,
    /// Emit maps for concat targets. JS and CSS bundles always carry one.
    pub source_map: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        Self {
            production: false,
            watch: false,
            source_map: true,
        }
    }
}
