//! Vehicle selection state.
//!
//! A selection is an ordered tuple of five stages: year, brand, model,
//! modification and lamp position. A stage may only hold a value while every
//! stage above it holds one; writing a stage unsets everything below it.
//!
//! # Architecture
//!
//! - [`FilterTuple`]: the partially filled selection
//! - [`FieldUpdate`]: a single stage write, carrying its own stage
//! - [`CascadeController`]: owns a tuple plus the option lists derived from it
//!
//! # Example
//!
//! ```rust
//! use bulb_fitment::selection::{FieldUpdate, FilterTuple, Stage};
//!
//! let mut tuple = FilterTuple::default();
//! tuple.apply(FieldUpdate::Year(Some(2019))).unwrap();
//! tuple.apply(FieldUpdate::Brand(Some("BMW".into()))).unwrap();
//! assert!(tuple.is_ready_for_stage(Stage::Model));
//!
//! tuple.apply(FieldUpdate::Year(Some(2020))).unwrap();
//! assert_eq!(tuple.brand, None);
//! ```

mod controller;

pub use controller::{CascadeController, CategoryResult};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogQuery, Category};
use crate::error::SelectionError;

// =============================================================================
// Stages
// =============================================================================

/// One position in the ordered selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Year,
    Brand,
    Model,
    Modification,
    Position,
}

impl Stage {
    /// All stages in cascade order.
    pub const ALL: [Stage; 5] = [
        Stage::Year,
        Stage::Brand,
        Stage::Model,
        Stage::Modification,
        Stage::Position,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Category whose options populate this stage.
    pub fn options_category(self) -> Category {
        match self {
            Stage::Year => Category::Years,
            Stage::Brand => Category::Brands,
            Stage::Model => Category::Models,
            Stage::Modification => Category::Modifications,
            Stage::Position => Category::Positions,
        }
    }

    /// Category that becomes fetchable once this stage is set.
    pub fn next_category(self) -> Category {
        match self {
            Stage::Year => Category::Brands,
            Stage::Brand => Category::Models,
            Stage::Model => Category::Modifications,
            Stage::Modification => Category::Positions,
            Stage::Position => Category::Bulbs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Year => "year",
            Stage::Brand => "brand",
            Stage::Model => "model",
            Stage::Modification => "modification",
            Stage::Position => "position",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Pair values
// =============================================================================

/// Engine/body variant of a model. Either side may be missing in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modification {
    #[serde(rename = "model_type_name", default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
}

impl Modification {
    pub fn new(model_type: Option<&str>, body_type: Option<&str>) -> Self {
        Self {
            model_type: model_type.map(str::to_string),
            body_type: body_type.map(str::to_string),
        }
    }

    /// `{null, null}` counts as an unset stage.
    pub fn is_empty(&self) -> bool {
        is_blank(self.model_type.as_deref()) && is_blank(self.body_type.as_deref())
    }
}

/// Lamp position within an optional catalog grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionChoice {
    #[serde(default)]
    pub position_category: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl PositionChoice {
    pub fn new(position_category: Option<&str>, position: &str) -> Self {
        Self {
            position_category: position_category.map(str::to_string),
            position: Some(position.to_string()),
        }
    }

    /// `{null, null}` counts as an unset stage.
    pub fn is_empty(&self) -> bool {
        is_blank(self.position_category.as_deref()) && is_blank(self.position.as_deref())
    }
}

/// Missing, empty or whitespace-only.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    non_blank(value).is_none()
}

/// `value`, unless it is blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Field updates
// =============================================================================

/// A write to exactly one stage. `None` (or an empty value) unsets the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Year(Option<i32>),
    Brand(Option<String>),
    Model(Option<String>),
    Modification(Option<Modification>),
    Position(Option<PositionChoice>),
}

impl FieldUpdate {
    pub fn stage(&self) -> Stage {
        match self {
            FieldUpdate::Year(_) => Stage::Year,
            FieldUpdate::Brand(_) => Stage::Brand,
            FieldUpdate::Model(_) => Stage::Model,
            FieldUpdate::Modification(_) => Stage::Modification,
            FieldUpdate::Position(_) => Stage::Position,
        }
    }

    /// True when this write leaves its stage unset.
    pub fn is_unset(&self) -> bool {
        match self {
            FieldUpdate::Year(v) => v.is_none(),
            FieldUpdate::Brand(v) | FieldUpdate::Model(v) => is_blank(v.as_deref()),
            FieldUpdate::Modification(v) => v.as_ref().is_none_or(Modification::is_empty),
            FieldUpdate::Position(v) => v.as_ref().is_none_or(PositionChoice::is_empty),
        }
    }
}

// =============================================================================
// Filter tuple
// =============================================================================

/// The ordered, partially filled selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTuple {
    pub year: Option<i32>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub modification: Option<Modification>,
    pub position: Option<PositionChoice>,
}

impl FilterTuple {
    /// Whether a stage holds a value. Empty pairs count as unset.
    pub fn is_set(&self, stage: Stage) -> bool {
        match stage {
            Stage::Year => self.year.is_some(),
            Stage::Brand => !is_blank(self.brand.as_deref()),
            Stage::Model => !is_blank(self.model.as_deref()),
            Stage::Modification => self.modification.as_ref().is_some_and(|m| !m.is_empty()),
            Stage::Position => self.position.as_ref().is_some_and(|p| !p.is_empty()),
        }
    }

    /// True iff every stage above `stage` is set.
    pub fn is_ready_for_stage(&self, stage: Stage) -> bool {
        Stage::ALL[..stage.index()].iter().all(|s| self.is_set(*s))
    }

    /// First stage without a value, if any.
    pub fn lowest_unset(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.is_set(*s))
    }

    /// Write one stage and unset everything below it.
    ///
    /// Rejects writes to a stage whose upstream is incomplete. Empty values are
    /// normalized to `None`.
    pub fn apply(&mut self, update: FieldUpdate) -> Result<(), SelectionError> {
        let stage = update.stage();
        if !self.is_ready_for_stage(stage) {
            return Err(SelectionError::StageNotReady { stage });
        }

        let unset = update.is_unset();
        match update {
            FieldUpdate::Year(v) => self.year = v,
            FieldUpdate::Brand(v) => self.brand = v.filter(|_| !unset),
            FieldUpdate::Model(v) => self.model = v.filter(|_| !unset),
            FieldUpdate::Modification(v) => self.modification = v.filter(|_| !unset),
            FieldUpdate::Position(v) => self.position = v.filter(|_| !unset),
        }
        self.truncate_after(stage);
        Ok(())
    }

    /// Unset every stage strictly below `stage`.
    pub fn truncate_after(&mut self, stage: Stage) {
        for below in Stage::ALL.into_iter().skip(stage.index() + 1) {
            match below {
                Stage::Year => self.year = None,
                Stage::Brand => self.brand = None,
                Stage::Model => self.model = None,
                Stage::Modification => self.modification = None,
                Stage::Position => self.position = None,
            }
        }
    }

    /// Catalog query for `category`, or `None` while its upstream is incomplete.
    ///
    /// The query carries only the upstream prefix, so its cache key doubles as
    /// the freshness key of the resulting option list.
    pub fn query_for(&self, category: Category) -> Option<CatalogQuery> {
        let upstream = category.upstream_stages();
        if !upstream.iter().all(|s| self.is_set(*s)) {
            return None;
        }

        let mut prefix = self.clone();
        match upstream.last() {
            Some(last) => prefix.truncate_after(*last),
            None => prefix = FilterTuple::default(),
        }
        Some(CatalogQuery::new(category, prefix))
    }
}
