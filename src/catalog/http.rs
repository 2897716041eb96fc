use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::catalog::{CatalogGateway, CatalogQuery, CatalogResponse, Category};
use crate::error::CatalogError;
use crate::selection::Stage;

const OPTIONS_PATH: &str = "api/fitment/options";

/// Catalog served by a remote options endpoint.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(OPTIONS_PATH)?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// Request URL for `query`. Unset pair components travel as empty strings.
    pub fn url_for(&self, query: &CatalogQuery) -> Url {
        let f = &query.filters;
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("level", query.category.as_level());
            for stage in query.category.upstream_stages() {
                match stage {
                    Stage::Year => {
                        pairs.append_pair("year", &f.year.map(|y| y.to_string()).unwrap_or_default());
                    }
                    Stage::Brand => {
                        pairs.append_pair("brand", f.brand.as_deref().unwrap_or_default());
                    }
                    Stage::Model => {
                        pairs.append_pair("model", f.model.as_deref().unwrap_or_default());
                    }
                    Stage::Modification => {
                        pairs.append_pair("modelType", query.model_type().unwrap_or_default());
                        pairs.append_pair("bodyType", query.body_type().unwrap_or_default());
                    }
                    Stage::Position => {
                        pairs.append_pair(
                            "positionCategory",
                            query.position_category().unwrap_or_default(),
                        );
                        pairs.append_pair("position", query.position().unwrap_or_default());
                    }
                }
            }
        }
        url
    }
}

#[async_trait]
impl CatalogGateway for HttpCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<CatalogResponse, CatalogError> {
        let url = self.url_for(query);
        tracing::debug!(category = %query.category, url = %url, "Requesting remote catalog");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        decode(query.category, body)
    }
}

fn decode(category: Category, body: serde_json::Value) -> Result<CatalogResponse, CatalogError> {
    Ok(CatalogResponse::from_json(category, body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{FilterTuple, Modification, PositionChoice};

    #[test]
    fn test_wrong_payload_shape_is_a_decode_error() {
        let err = decode(Category::Years, serde_json::json!(["2019"])).unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)), "{err:?}");

        let ok = decode(Category::Brands, serde_json::json!(["BMW"])).unwrap();
        assert_eq!(ok, CatalogResponse::Brands(vec!["BMW".into()]));
    }

    #[test]
    fn test_url_carries_upstream_fields_only() {
        let catalog = HttpCatalog::new("http://catalog.local/base", Duration::from_secs(5)).unwrap();
        let tuple = FilterTuple {
            year: Some(2018),
            brand: Some("AUDI".into()),
            model: Some("A4".into()),
            modification: Some(Modification::new(Some("B9"), None)),
            position: Some(PositionChoice::new(None, "Low Beam")),
        };

        let url = catalog.url_for(&tuple.query_for(Category::Models).unwrap());
        assert_eq!(
            url.as_str(),
            "http://catalog.local/base/api/fitment/options?level=models&year=2018&brand=AUDI"
        );

        let url = catalog.url_for(&tuple.query_for(Category::Bulbs).unwrap());
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("level".into(), "bulbsByPosition".into())));
        assert!(pairs.contains(&("bodyType".into(), String::new())));
        assert!(pairs.contains(&("positionCategory".into(), String::new())));
        assert!(pairs.contains(&("position".into(), "Low Beam".into())));
    }
}
