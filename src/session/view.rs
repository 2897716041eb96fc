//! Presentation snapshot of a session.

use serde::Serialize;

use crate::catalog::lamp::{LampFunction, position_label};
use crate::catalog::{BulbCandidate, CatalogResponse, Category};
use crate::decision::Decision;
use crate::decision::links::PartLinkResolver;
use crate::fetch::LoadingFlags;
use crate::selection::{CascadeController, FilterTuple, Modification, PositionChoice, Stage};

/// Brands pinned to the top of the brand list, in this order.
pub const TOP_BRANDS: [&str; 10] = [
    "MERCEDES",
    "BMW",
    "HYUNDAI",
    "TOYOTA",
    "VOLKSWAGEN",
    "AUDI",
    "OPEL",
    "FORD",
    "PEUGEOT",
    "RENAULT",
];

const MISSING_SIDE: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModificationOption {
    #[serde(flatten)]
    pub value: Modification,
    pub label: String,
}

impl From<Modification> for ModificationOption {
    fn from(value: Modification) -> Self {
        let label = format!(
            "{} / {}",
            value.model_type.as_deref().unwrap_or(MISSING_SIDE),
            value.body_type.as_deref().unwrap_or(MISSING_SIDE)
        );
        Self { value, label }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionOption {
    #[serde(flatten)]
    pub value: PositionChoice,
    pub label: String,
}

impl From<PositionChoice> for PositionOption {
    fn from(value: PositionChoice) -> Self {
        let label = position_label(value.position.as_deref().unwrap_or_default());
        Self { value, label }
    }
}

/// Fresh option lists, ordered for display. A list is empty while its
/// category has no result for the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageOptions {
    pub years: Vec<i32>,
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub modifications: Vec<ModificationOption>,
    pub positions: Vec<PositionOption>,
    pub bulbs: Vec<BulbCandidate>,
}

impl StageOptions {
    fn from_controller(controller: &CascadeController) -> Self {
        let mut options = StageOptions::default();
        for category in Category::ALL {
            let Some(result) = controller.options(category) else {
                continue;
            };
            match result.options.clone() {
                CatalogResponse::Years(v) => options.years = v,
                CatalogResponse::Brands(v) => options.brands = order_brands(v),
                CatalogResponse::Models(v) => options.models = v,
                CatalogResponse::Modifications(v) => {
                    options.modifications = v.into_iter().map(Into::into).collect();
                }
                CatalogResponse::Positions(v) => {
                    options.positions = order_positions(v).into_iter().map(Into::into).collect();
                }
                CatalogResponse::Bulbs(v) => options.bulbs = v,
            }
        }
        options
    }
}

/// Everything a client needs to render one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub id: String,
    pub selection: FilterTuple,
    /// First stage still waiting for a value.
    pub next_stage: Option<Stage>,
    pub options: StageOptions,
    pub loading: LoadingFlags,
    pub decision: Option<Decision>,
    /// Present only when the decision needs manual support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_phone: Option<String>,
}

impl SessionView {
    pub fn build(
        id: &str,
        controller: &CascadeController,
        links: &dyn PartLinkResolver,
        support_phone: &str,
    ) -> Self {
        let decision = controller.decision(links);
        let support_phone = decision
            .as_ref()
            .and_then(Decision::escalation)
            .map(|_| support_phone.to_string());

        Self {
            id: id.to_string(),
            selection: controller.selection().clone(),
            next_stage: controller.selection().lowest_unset(),
            options: StageOptions::from_controller(controller),
            loading: controller.loading(),
            decision,
            support_phone,
        }
    }
}

/// Pinned brands first, in pinned order, then the rest alphabetically.
pub fn order_brands(brands: Vec<String>) -> Vec<String> {
    let mut ordered: Vec<String> = TOP_BRANDS
        .iter()
        .filter(|top| brands.iter().any(|b| b == *top))
        .map(|top| (*top).to_string())
        .collect();
    let mut rest: Vec<String> = brands
        .into_iter()
        .filter(|b| !TOP_BRANDS.contains(&b.as_str()))
        .collect();
    rest.sort();
    rest.dedup();
    ordered.extend(rest);
    ordered
}

/// High beam, low beam, fog, then anything unrecognized alphabetically.
pub fn order_positions(mut positions: Vec<PositionChoice>) -> Vec<PositionChoice> {
    positions.sort_by_cached_key(|p| {
        let raw = p.position.clone().unwrap_or_default();
        let rank = match LampFunction::from_position(&raw) {
            Some(LampFunction::HighBeam) => 0,
            Some(LampFunction::LowBeam) => 1,
            Some(LampFunction::Fog) => 2,
            None => 3,
        };
        (rank, raw.to_lowercase())
    });
    positions
}
