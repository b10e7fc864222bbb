//! Picks which models of an archive to extract, by naming convention.
//!
//! Goal models carry `GOAL` somewhere in their name with the colour as the
//! final character (`GOAL_B`, `GOAL_G`, `GOAL_R`). Switch models start with
//! `BUTTON_`.

use std::fmt;

use tracing::debug;

use crate::error::{ArchiveError, IResult};
use crate::models::gma::{GmaArchive, ModelName};
use crate::recognized::Recognized;

pub const GOAL_MARKER: &str = "GOAL";
pub const SWITCH_PREFIX: &str = "BUTTON_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalColor {
    Blue,
    Green,
    Red,
}

impl GoalColor {
    pub fn from_marker(marker: char) -> Recognized<GoalColor, char> {
        match marker {
            'B' => GoalColor::Blue.into(),
            'G' => GoalColor::Green.into(),
            'R' => GoalColor::Red.into(),
            other => Recognized::Unknown(other),
        }
    }

    /// File suffix used for this goal's extracted pair.
    pub fn suffix(&self) -> &'static str {
        match self {
            GoalColor::Blue => "GOAL_B",
            GoalColor::Green => "GOAL_G",
            GoalColor::Red => "GOAL_R",
        }
    }
}

impl fmt::Display for GoalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoalColor::Blue => "Blue goal",
            GoalColor::Green => "Green goal",
            GoalColor::Red => "Red goal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ModelKind {
    Goal(Recognized<GoalColor, char>),
    Switch,
    Other,
}

impl ModelKind {
    pub fn classify(name: &str) -> ModelKind {
        if name.contains(GOAL_MARKER) {
            // `GOAL` is non-empty, so the name always has a last character.
            let marker = name.chars().last().unwrap_or_default();
            ModelKind::Goal(GoalColor::from_marker(marker))
        } else if name.starts_with(SWITCH_PREFIX) {
            ModelKind::Switch
        } else {
            ModelKind::Other
        }
    }
}

/// Which models to pull out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Goals,
    Switches,
    Model(String),
}

/// A model chosen for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SelectedModel<'a> {
    pub logical: usize,
    /// Name bytes as stored, for writing into extracted archives.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub stored_name: ModelName<'a>,
    pub name: String,
    pub kind: ModelKind,
    /// Suffix for the output file names.
    pub suffix: String,
}

impl Selection {
    fn matches(&self, name: &str, kind: &ModelKind) -> bool {
        match self {
            Selection::Goals => matches!(kind, ModelKind::Goal(_)),
            Selection::Switches => name.starts_with(SWITCH_PREFIX),
            Selection::Model(wanted) => name == wanted,
        }
    }

    fn nothing_found(&self) -> ArchiveError {
        match self {
            Selection::Goals => ArchiveError::NoMatchingEntry("goal".to_string()),
            Selection::Switches => ArchiveError::NoMatchingEntry("switches".to_string()),
            Selection::Model(name) => ArchiveError::ModelNotFound(name.clone()),
        }
    }
}

/// Walk the name list and collect every model matching `selection`.
pub fn select_models<'a>(
    gma: &GmaArchive<'a>,
    selection: &Selection,
) -> IResult<Vec<SelectedModel<'a>>> {
    let mut selected = Vec::new();

    for (logical, stored_name) in gma.names().enumerate() {
        let stored_name = stored_name?;
        let name = stored_name.to_string_lossy().into_owned();
        let kind = ModelKind::classify(&name);
        if !selection.matches(&name, &kind) {
            continue;
        }

        let suffix = match &kind {
            ModelKind::Goal(Recognized::Known(color)) => color.suffix().to_string(),
            _ => name.clone(),
        };
        debug!(logical, name = %name, suffix = %suffix, "selected model");

        selected.push(SelectedModel {
            logical,
            stored_name,
            name,
            kind,
            suffix,
        });
    }

    if selected.is_empty() {
        return Err(selection.nothing_found());
    }

    Ok(selected)
}
