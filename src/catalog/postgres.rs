use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::catalog::lamp::RECOGNIZED_POSITIONS;
use crate::catalog::{BulbCandidate, CatalogGateway, CatalogQuery, CatalogResponse, Category};
use crate::error::CatalogError;
use crate::selection::{Modification, PositionChoice, non_blank};

/// Catalog backed by the `bulb_fitment` table.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
        run_migrations: bool,
    ) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        if run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(sqlx::Error::from)?;
        }

        Ok(Self { pool })
    }

    async fn years(&self) -> Result<Vec<i32>, CatalogError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT model_year
            FROM bulb_fitment
            ORDER BY model_year DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<i32, _>("model_year").map_err(CatalogError::from))
            .collect()
    }

    async fn brands(&self, year: i32) -> Result<Vec<String>, CatalogError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT brand
            FROM bulb_fitment
            WHERE model_year = $1
            ORDER BY brand ASC
            ",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        strings(&rows, "brand")
    }

    async fn models(&self, year: i32, brand: &str) -> Result<Vec<String>, CatalogError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT model_name
            FROM bulb_fitment
            WHERE model_year = $1 AND brand = $2
            ORDER BY model_name ASC
            ",
        )
        .bind(year)
        .bind(brand)
        .fetch_all(&self.pool)
        .await?;

        strings(&rows, "model_name")
    }

    async fn modifications(
        &self,
        year: i32,
        brand: &str,
        model: &str,
    ) -> Result<Vec<Modification>, CatalogError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT model_type_name, body_type
            FROM bulb_fitment
            WHERE model_year = $1 AND brand = $2 AND model_name = $3
            ORDER BY model_type_name NULLS LAST, body_type NULLS LAST
            ",
        )
        .bind(year)
        .bind(brand)
        .bind(model)
        .fetch_all(&self.pool)
        .await?;

        let mut mods = Vec::with_capacity(rows.len());
        for row in rows {
            mods.push(Modification {
                model_type: row.try_get("model_type_name")?,
                body_type: row.try_get("body_type")?,
            });
        }
        Ok(mods)
    }

    async fn positions(
        &self,
        year: i32,
        brand: &str,
        model: &str,
        query: &CatalogQuery,
    ) -> Result<Vec<PositionChoice>, CatalogError> {
        let recognized: Vec<String> = RECOGNIZED_POSITIONS.iter().map(|p| (*p).to_string()).collect();

        let rows = sqlx::query(
            r"
            SELECT DISTINCT position_category, position
            FROM bulb_fitment
            WHERE model_year = $1
              AND brand = $2
              AND model_name = $3
              AND (model_type_name IS NOT DISTINCT FROM $4)
              AND (body_type IS NOT DISTINCT FROM $5)
              AND position IS NOT NULL
              AND lower(position) = ANY($6)
            ORDER BY position ASC
            ",
        )
        .bind(year)
        .bind(brand)
        .bind(model)
        .bind(query.model_type())
        .bind(query.body_type())
        .bind(&recognized)
        .fetch_all(&self.pool)
        .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            positions.push(PositionChoice {
                position_category: row.try_get("position_category")?,
                position: row.try_get("position")?,
            });
        }
        Ok(positions)
    }

    async fn bulbs(
        &self,
        year: i32,
        brand: &str,
        model: &str,
        position: &str,
        query: &CatalogQuery,
    ) -> Result<Vec<BulbCandidate>, CatalogError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT bulb_type, technology
            FROM bulb_fitment
            WHERE model_year = $1
              AND brand = $2
              AND model_name = $3
              AND (model_type_name IS NOT DISTINCT FROM $4)
              AND (body_type IS NOT DISTINCT FROM $5)
              AND (position_category IS NOT DISTINCT FROM $6)
              AND position = $7
              AND bulb_type IS NOT NULL
            ORDER BY bulb_type ASC
            ",
        )
        .bind(year)
        .bind(brand)
        .bind(model)
        .bind(query.model_type())
        .bind(query.body_type())
        .bind(query.position_category())
        .bind(position)
        .fetch_all(&self.pool)
        .await?;

        let mut bulbs = Vec::with_capacity(rows.len());
        for row in rows {
            bulbs.push(BulbCandidate {
                part_number: row.try_get("bulb_type")?,
                technology: row.try_get("technology")?,
            });
        }
        Ok(bulbs)
    }
}

fn strings(rows: &[PgRow], column: &str) -> Result<Vec<String>, CatalogError> {
    rows.iter()
        .map(|r| r.try_get::<String, _>(column).map_err(CatalogError::from))
        .collect()
}

#[async_trait]
impl CatalogGateway for PgCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<CatalogResponse, CatalogError> {
        let f = &query.filters;
        let year = f.year;
        let brand = non_blank(f.brand.as_deref());
        let model = non_blank(f.model.as_deref());

        let response = match (query.category, year, brand, model) {
            (Category::Years, ..) => CatalogResponse::Years(self.years().await?),
            (Category::Brands, Some(year), ..) => CatalogResponse::Brands(self.brands(year).await?),
            (Category::Models, Some(year), Some(brand), _) => {
                CatalogResponse::Models(self.models(year, brand).await?)
            }
            (Category::Modifications, Some(year), Some(brand), Some(model)) => {
                CatalogResponse::Modifications(self.modifications(year, brand, model).await?)
            }
            (Category::Positions, Some(year), Some(brand), Some(model)) => {
                CatalogResponse::Positions(self.positions(year, brand, model, query).await?)
            }
            (Category::Bulbs, Some(year), Some(brand), Some(model)) => match query.position() {
                Some(position) => CatalogResponse::Bulbs(
                    self.bulbs(year, brand, model, position, query).await?,
                ),
                None => CatalogResponse::empty(Category::Bulbs),
            },
            (category, ..) => CatalogResponse::empty(category),
        };

        tracing::debug!(
            category = %query.category,
            rows = response.len(),
            "Catalog query served"
        );
        Ok(response)
    }
}
