use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::lamp::is_recognized;
use crate::catalog::{BulbCandidate, CatalogGateway, CatalogQuery, CatalogResponse, Category};
use crate::error::CatalogError;
use crate::selection::{Modification, PositionChoice, is_blank};

/// One row of the fitment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitmentRow {
    pub model_year: i32,
    pub brand: String,
    pub model_name: String,
    #[serde(default)]
    pub model_type_name: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub position_category: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub bulb_type: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
}

/// Catalog over rows held in memory.
///
/// Mirrors the filtering and ordering of the Postgres catalog so it can stand
/// in for it offline.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    rows: Vec<FitmentRow>,
}

impl MemoryCatalog {
    pub fn new(rows: Vec<FitmentRow>) -> Self {
        Self { rows }
    }

    /// Load rows from a YAML sequence.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Fixture(format!("{}: {e}", path.display())))?;
        let rows: Vec<FitmentRow> = serde_yaml::from_str(&text)
            .map_err(|e| CatalogError::Fixture(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), rows = rows.len(), "Loaded fitment fixture");
        Ok(Self::new(rows))
    }

    fn matching<'a>(
        &'a self,
        query: &'a CatalogQuery,
        depth: Category,
    ) -> impl Iterator<Item = &'a FitmentRow> + 'a {
        let f = &query.filters;
        self.rows.iter().filter(move |r| {
            let mut ok = true;
            if depth >= Category::Brands {
                ok &= f.year == Some(r.model_year);
            }
            if depth >= Category::Models {
                ok &= f.brand.as_deref() == Some(r.brand.as_str());
            }
            if depth >= Category::Modifications {
                ok &= f.model.as_deref() == Some(r.model_name.as_str());
            }
            if depth >= Category::Positions {
                ok &= r.model_type_name.as_deref() == query.model_type()
                    && r.body_type.as_deref() == query.body_type();
            }
            if depth >= Category::Bulbs {
                ok &= r.position_category.as_deref() == query.position_category()
                    && r.position.as_deref() == query.position();
            }
            ok
        })
    }
}

/// `None` sorts after every value, like `NULLS LAST`.
fn nulls_last(value: Option<&String>) -> (bool, Option<&String>) {
    (value.is_none(), value)
}

#[async_trait]
impl CatalogGateway for MemoryCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<CatalogResponse, CatalogError> {
        let category = query.category;
        let f = &query.filters;
        let missing_upstream = (category >= Category::Brands && f.year.is_none())
            || (category >= Category::Models && is_blank(f.brand.as_deref()))
            || (category >= Category::Modifications && is_blank(f.model.as_deref()))
            || (category == Category::Bulbs && query.position().is_none());
        if missing_upstream {
            return Ok(CatalogResponse::empty(category));
        }

        let rows = self.matching(query, category);
        let response = match category {
            Category::Years => {
                let years: BTreeSet<i32> = rows.map(|r| r.model_year).collect();
                CatalogResponse::Years(years.into_iter().rev().collect())
            }
            Category::Brands => {
                let brands: BTreeSet<&String> = rows.map(|r| &r.brand).collect();
                CatalogResponse::Brands(brands.into_iter().cloned().collect())
            }
            Category::Models => {
                let models: BTreeSet<&String> = rows.map(|r| &r.model_name).collect();
                CatalogResponse::Models(models.into_iter().cloned().collect())
            }
            Category::Modifications => {
                let mut mods: Vec<Modification> = rows
                    .map(|r| Modification {
                        model_type: r.model_type_name.clone(),
                        body_type: r.body_type.clone(),
                    })
                    .collect();
                mods.sort_by(|a, b| {
                    nulls_last(a.model_type.as_ref())
                        .cmp(&nulls_last(b.model_type.as_ref()))
                        .then_with(|| {
                            nulls_last(a.body_type.as_ref()).cmp(&nulls_last(b.body_type.as_ref()))
                        })
                });
                mods.dedup();
                CatalogResponse::Modifications(mods)
            }
            Category::Positions => {
                let mut positions: Vec<PositionChoice> = rows
                    .filter(|r| r.position.as_deref().is_some_and(is_recognized))
                    .map(|r| PositionChoice {
                        position_category: r.position_category.clone(),
                        position: r.position.clone(),
                    })
                    .collect();
                positions.sort_by(|a, b| {
                    a.position
                        .cmp(&b.position)
                        .then_with(|| a.position_category.cmp(&b.position_category))
                });
                positions.dedup();
                CatalogResponse::Positions(positions)
            }
            Category::Bulbs => {
                let mut bulbs: Vec<BulbCandidate> = rows
                    .filter_map(|r| {
                        r.bulb_type.as_ref().map(|b| BulbCandidate {
                            part_number: b.clone(),
                            technology: r.technology.clone(),
                        })
                    })
                    .collect();
                bulbs.sort_by(|a, b| {
                    a.part_number
                        .cmp(&b.part_number)
                        .then_with(|| a.technology.cmp(&b.technology))
                });
                bulbs.dedup();
                CatalogResponse::Bulbs(bulbs)
            }
        };
        Ok(response)
    }
}
