//! Fix plans proposed by repair strategies and the record of applying them.

use serde::{Deserialize, Serialize};

/// Overwrite one file with new content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFix {
    pub file_path: String,
    pub new_content: String,
    #[serde(default)]
    pub reason: String,
}

impl FileFix {
    /// Replace `file_path` with `new_content`.
    pub fn new(
        file_path: impl Into<String>,
        new_content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            new_content: new_content.into(),
            reason: reason.into(),
        }
    }
}

/// Apply order for layered plans: dependencies, then config, then code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Dependencies,
    Config,
    Code,
}

/// A group of fixes and commands applied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixLayer {
    pub kind: LayerKind,
    #[serde(default)]
    pub fixes: Vec<FileFix>,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl FixLayer {
    /// Empty layer of `kind`.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            fixes: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// True when the layer has no fixes and no commands.
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty() && self.commands.is_empty()
    }
}

/// A proposed fix: file overwrites plus post-fix shell commands.
///
/// Flat `fixes`/`commands` are applied as a trailing code layer after any
/// explicit `layers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPlan {
    #[serde(default)]
    pub error_summary: String,

    #[serde(default)]
    pub root_cause: String,

    #[serde(default)]
    pub fixes: Vec<FileFix>,

    #[serde(default, alias = "additional_commands")]
    pub commands: Vec<String>,

    #[serde(default)]
    pub layers: Vec<FixLayer>,
}

impl FixPlan {
    /// Plan with no fixes.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_summary(mut self, error_summary: impl Into<String>, root_cause: impl Into<String>) -> Self {
        self.error_summary = error_summary.into();
        self.root_cause = root_cause.into();
        self
    }

    #[must_use]
    pub fn with_fix(mut self, fix: FileFix) -> Self {
        self.fixes.push(fix);
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer: FixLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// A plan with nothing to write and nothing to run.
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty() && self.commands.is_empty() && self.layers.iter().all(FixLayer::is_empty)
    }

    /// Every file fix across layers, in apply order.
    pub fn all_fixes(&self) -> Vec<&FileFix> {
        let mut ordered: Vec<&FixLayer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| l.kind);
        ordered
            .into_iter()
            .flat_map(|l| l.fixes.iter())
            .chain(self.fixes.iter())
            .collect()
    }

    /// Layers in apply order. Explicit layers are stably sorted by kind;
    /// flat fixes and commands follow as an implicit code layer.
    pub fn ordered_layers(&self) -> Vec<FixLayer> {
        let mut layers: Vec<FixLayer> = self
            .layers
            .iter()
            .filter(|l| !l.is_empty())
            .cloned()
            .collect();
        layers.sort_by_key(|l| l.kind);

        if !self.fixes.is_empty() || !self.commands.is_empty() {
            layers.push(FixLayer {
                kind: LayerKind::Code,
                fixes: self.fixes.clone(),
                commands: self.commands.clone(),
            });
        }
        layers
    }
}

/// Outcome of one post-fix command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    /// `None` when the command never produced an exit status.
    pub exit_code: Option<i32>,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// What applying a [`FixPlan`] actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub files_written: Vec<String>,
    /// Fixes that were not written, with the reason.
    #[serde(default)]
    pub skipped: Vec<(String, String)>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
}

impl ApplyReport {
    /// Commands that exited non-zero or timed out.
    pub fn failed_commands(&self) -> usize {
        self.commands.iter().filter(|c| !c.succeeded).count()
    }
}
