//! Catalog options endpoint.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::catalog::{CatalogQuery, Category};
use crate::selection::{FilterTuple, Modification, PositionChoice, non_blank};

const YEARS_MAX_AGE_SECS: u32 = 24 * 3600;
const OPTIONS_MAX_AGE_SECS: u32 = 6 * 3600;
const STALE_WHILE_REVALIDATE_SECS: u32 = 86_400;

/// Query string of the options endpoint. Empty values count as missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsParams {
    pub level: Option<String>,
    pub year: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub model_type: Option<String>,
    pub body_type: Option<String>,
    pub position_category: Option<String>,
    pub position: Option<String>,
}

impl OptionsParams {
    /// Level to serve; a missing level means years.
    fn category(&self) -> Option<Category> {
        match non_blank(self.level.as_deref()) {
            None => Some(Category::Years),
            Some(level) => Category::from_level(level),
        }
    }

    /// Filters taken verbatim from the query string, without cascade checks.
    fn filters(&self) -> Result<FilterTuple, String> {
        let year = non_blank(self.year.as_deref())
            .map(|y| y.trim().parse::<i32>().map_err(|_| format!("invalid year '{y}'")))
            .transpose()?;
        let model_type = non_blank(self.model_type.as_deref());
        let body_type = non_blank(self.body_type.as_deref());
        let position = non_blank(self.position.as_deref());

        Ok(FilterTuple {
            year,
            brand: non_blank(self.brand.as_deref()).map(str::to_string),
            model: non_blank(self.model.as_deref()).map(str::to_string),
            modification: Some(Modification::new(model_type, body_type)),
            position: position.map(|p| {
                PositionChoice::new(non_blank(self.position_category.as_deref()), p)
            }),
        })
    }
}

fn cache_control(category: Category) -> HeaderValue {
    let max_age = if category == Category::Years {
        YEARS_MAX_AGE_SECS
    } else {
        OPTIONS_MAX_AGE_SECS
    };
    let value = format!(
        "public, max-age={max_age}, s-maxage={max_age}, stale-while-revalidate={STALE_WHILE_REVALIDATE_SECS}"
    );
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("no-cache"))
}

/// GET /api/fitment/options - Distinct options for one cascade level.
pub async fn get_options(
    State(state): State<AppState>,
    Query(params): Query<OptionsParams>,
) -> Result<Response, (StatusCode, String)> {
    let Some(category) = params.category() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid level" })),
        )
            .into_response());
    };
    let filters = params
        .filters()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let query = CatalogQuery::new(category, filters);
    let options = state.gateway.query(&query).await.map_err(|e| {
        tracing::error!(level = category.as_level(), error = %e, "Options query failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let mut response = Json(options).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control(category));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_level_means_years() {
        assert_eq!(OptionsParams::default().category(), Some(Category::Years));
        let params = OptionsParams {
            level: Some("bulbsByPosition".into()),
            ..OptionsParams::default()
        };
        assert_eq!(params.category(), Some(Category::Bulbs));
        let params = OptionsParams {
            level: Some("trims".into()),
            ..OptionsParams::default()
        };
        assert_eq!(params.category(), None);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let params = OptionsParams {
            year: Some("2019".into()),
            brand: Some(String::new()),
            model_type: Some(String::new()),
            body_type: Some("SUV".into()),
            position: Some("  ".into()),
            ..OptionsParams::default()
        };
        let filters = params.filters().unwrap();
        assert_eq!(filters.year, Some(2019));
        assert_eq!(filters.brand, None);
        assert_eq!(filters.modification, Some(Modification::new(None, Some("SUV"))));
        assert_eq!(filters.position, None);
    }

    #[test]
    fn test_bad_year_is_rejected() {
        let params = OptionsParams {
            year: Some("soon".into()),
            ..OptionsParams::default()
        };
        assert!(params.filters().is_err());
    }

    #[test]
    fn test_cache_headers_per_level() {
        assert_eq!(
            cache_control(Category::Years).to_str().unwrap(),
            "public, max-age=86400, s-maxage=86400, stale-while-revalidate=86400"
        );
        assert!(
            cache_control(Category::Models)
                .to_str()
                .unwrap()
                .starts_with("public, max-age=21600,")
        );
    }
}
