//! Catalog gateway abstraction.
//!
//! The catalog answers "given these upstream filters, which distinct values
//! exist for the next column". It owns ordering and deduplication at the
//! source; callers treat returned lists as sets. Nothing here caches.
//!
//! # Providers
//!
//! - [`postgres::PgCatalog`]: `select distinct` over the `bulb_fitment` table
//! - [`http::HttpCatalog`]: a remote `/api/fitment/options` endpoint
//! - [`memory::MemoryCatalog`]: rows held in memory, loaded from YAML

pub mod http;
pub mod lamp;
pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::selection::{FilterTuple, Modification, PositionChoice, Stage, non_blank};

// =============================================================================
// Categories
// =============================================================================

/// One of the six option lists the catalog can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Years,
    Brands,
    Models,
    Modifications,
    Positions,
    Bulbs,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Years,
        Category::Brands,
        Category::Models,
        Category::Modifications,
        Category::Positions,
        Category::Bulbs,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stages that must be set before this category can be queried.
    pub fn upstream_stages(self) -> &'static [Stage] {
        &Stage::ALL[..self.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Years => "years",
            Category::Brands => "brands",
            Category::Models => "models",
            Category::Modifications => "modifications",
            Category::Positions => "positions",
            Category::Bulbs => "bulbs",
        }
    }

    /// Name used by the `level` parameter of the options endpoint.
    pub fn as_level(self) -> &'static str {
        match self {
            Category::Years => "years",
            Category::Brands => "brands",
            Category::Models => "models",
            Category::Modifications => "mods",
            Category::Positions => "positions",
            Category::Bulbs => "bulbsByPosition",
        }
    }

    pub fn from_level(level: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_level() == level)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Queries & Responses
// =============================================================================

/// A category request together with the upstream prefix that scopes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub category: Category,
    pub filters: FilterTuple,
}

impl CatalogQuery {
    pub fn new(category: Category, filters: FilterTuple) -> Self {
        Self { category, filters }
    }

    /// Full semantic key: category plus every upstream field.
    ///
    /// Missing pair components are encoded as empty strings, and `|` or `\`
    /// inside a field is backslash-escaped, so distinct upstream tuples never
    /// share a key.
    pub fn cache_key(&self) -> String {
        let f = &self.filters;
        let year = f.year.map(|y| y.to_string());
        let mut fields: Vec<Option<&str>> = Vec::new();
        for stage in self.category.upstream_stages() {
            match stage {
                Stage::Year => fields.push(year.as_deref()),
                Stage::Brand => fields.push(f.brand.as_deref()),
                Stage::Model => fields.push(f.model.as_deref()),
                Stage::Modification => {
                    let m = f.modification.as_ref();
                    fields.push(m.and_then(|m| m.model_type.as_deref()));
                    fields.push(m.and_then(|m| m.body_type.as_deref()));
                }
                Stage::Position => {
                    let p = f.position.as_ref();
                    fields.push(p.and_then(|p| p.position_category.as_deref()));
                    fields.push(p.and_then(|p| p.position.as_deref()));
                }
            }
        }

        let mut key = self.category.as_str().to_string();
        for field in fields {
            key.push('|');
            for ch in field.unwrap_or_default().chars() {
                if matches!(ch, '|' | '\\') {
                    key.push('\\');
                }
                key.push(ch);
            }
        }
        key
    }

    pub(crate) fn model_type(&self) -> Option<&str> {
        self.filters
            .modification
            .as_ref()
            .and_then(|m| non_blank(m.model_type.as_deref()))
    }

    pub(crate) fn body_type(&self) -> Option<&str> {
        self.filters
            .modification
            .as_ref()
            .and_then(|m| non_blank(m.body_type.as_deref()))
    }

    pub(crate) fn position_category(&self) -> Option<&str> {
        self.filters
            .position
            .as_ref()
            .and_then(|p| non_blank(p.position_category.as_deref()))
    }

    pub(crate) fn position(&self) -> Option<&str> {
        self.filters
            .position
            .as_ref()
            .and_then(|p| non_blank(p.position.as_deref()))
    }
}

/// A replacement-bulb part for a fully specified selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BulbCandidate {
    #[serde(rename = "bulb_type")]
    pub part_number: String,
    /// Explicit lighting technology label, when the catalog has one.
    #[serde(default)]
    pub technology: Option<String>,
}

impl BulbCandidate {
    pub fn new(part_number: impl Into<String>, technology: Option<&str>) -> Self {
        Self {
            part_number: part_number.into(),
            technology: technology.map(str::to_string),
        }
    }
}

/// Option list for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CatalogResponse {
    Years(Vec<i32>),
    Brands(Vec<String>),
    Models(Vec<String>),
    Modifications(Vec<Modification>),
    Positions(Vec<PositionChoice>),
    Bulbs(Vec<BulbCandidate>),
}

impl CatalogResponse {
    /// Empty list of the right shape for `category`.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Years => CatalogResponse::Years(Vec::new()),
            Category::Brands => CatalogResponse::Brands(Vec::new()),
            Category::Models => CatalogResponse::Models(Vec::new()),
            Category::Modifications => CatalogResponse::Modifications(Vec::new()),
            Category::Positions => CatalogResponse::Positions(Vec::new()),
            Category::Bulbs => CatalogResponse::Bulbs(Vec::new()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CatalogResponse::Years(_) => Category::Years,
            CatalogResponse::Brands(_) => Category::Brands,
            CatalogResponse::Models(_) => Category::Models,
            CatalogResponse::Modifications(_) => Category::Modifications,
            CatalogResponse::Positions(_) => Category::Positions,
            CatalogResponse::Bulbs(_) => Category::Bulbs,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CatalogResponse::Years(v) => v.len(),
            CatalogResponse::Brands(v) | CatalogResponse::Models(v) => v.len(),
            CatalogResponse::Modifications(v) => v.len(),
            CatalogResponse::Positions(v) => v.len(),
            CatalogResponse::Bulbs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode an options-endpoint JSON body for `category`.
    ///
    /// Bulb lists are accepted either as row objects or as bare part-number
    /// strings.
    pub fn from_json(category: Category, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match category {
            Category::Years => CatalogResponse::Years(serde_json::from_value(value)?),
            Category::Brands => CatalogResponse::Brands(serde_json::from_value(value)?),
            Category::Models => CatalogResponse::Models(serde_json::from_value(value)?),
            Category::Modifications => {
                CatalogResponse::Modifications(serde_json::from_value(value)?)
            }
            Category::Positions => CatalogResponse::Positions(serde_json::from_value(value)?),
            Category::Bulbs => {
                let rows: Vec<BulbRow> = serde_json::from_value(value)?;
                CatalogResponse::Bulbs(rows.into_iter().map(BulbRow::into_candidate).collect())
            }
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BulbRow {
    Bare(String),
    Row(BulbCandidate),
}

impl BulbRow {
    fn into_candidate(self) -> BulbCandidate {
        match self {
            BulbRow::Bare(part_number) => BulbCandidate::new(part_number, None),
            BulbRow::Row(candidate) => candidate,
        }
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Source of truth for fitment options.
#[async_trait]
pub trait CatalogGateway: Send + Sync + fmt::Debug {
    /// Distinct values for `query.category` under the query's upstream filters.
    ///
    /// A query whose upstream is incomplete yields an empty list.
    async fn query(&self, query: &CatalogQuery) -> Result<CatalogResponse, CatalogError>;
}
