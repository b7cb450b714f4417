//! Credit issuance workflow: `idle → calculating → minting → complete`.
//!
//! The credit amount follows a fixed formula over the selected project:
//!
//! ```text
//! total = floor(base × ndvi_score × (1 + verification_bonus))
//! ```
//!
//! where `base` is the project's available credits (or a smaller custom
//! amount) and the bonus is 10% once any verification has been recorded.
//! Minting is simulated; completion yields a fabricated transaction hash.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Timing;
use crate::errors::{RegistryError, Result};
use crate::models::Project;
use crate::workflow::{MetricsProvider, Phase, WorkflowKind, WorkflowState};

pub const VERIFICATION_BONUS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditCalculation {
    pub base_credits: u64,
    pub quality_multiplier: f64,
    pub verification_bonus: f64,
    pub total_credits: u64,
    /// `total_credits × credit price`, in rupees.
    pub estimated_value: u64,
}

impl CreditCalculation {
    /// Compute the issuance for `project`.
    ///
    /// `custom_amount` caps the base credits and must lie in
    /// `1..=credits_available`; `None` issues everything available.
    pub fn for_project(
        project: &Project,
        custom_amount: Option<u64>,
        credit_price: u64,
    ) -> Result<Self> {
        let available = project.credits_available;
        if available == 0 {
            return Err(RegistryError::NoCreditsAvailable(project.id.clone()));
        }
        let base_credits = match custom_amount {
            Some(requested) if requested == 0 || requested > available => {
                return Err(RegistryError::InvalidAmount {
                    requested,
                    available,
                })
            }
            Some(requested) => requested,
            None => available,
        };

        let quality_multiplier = project.ndvi_score;
        let verification_bonus = if project.has_verification() {
            VERIFICATION_BONUS
        } else {
            0.0
        };
        let total_credits =
            (base_credits as f64 * quality_multiplier * (1.0 + verification_bonus)).floor() as u64;

        let estimated_value = total_credits.checked_mul(credit_price).ok_or_else(|| {
            RegistryError::Config(format!(
                "credit price {credit_price} overflows the value of {total_credits} credits"
            ))
        })?;

        Ok(Self {
            base_credits,
            quality_multiplier,
            verification_bonus,
            total_credits,
            estimated_value,
        })
    }
}

/// Inputs editable while the issuance is idle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssuanceDraft {
    pub project: Option<Project>,
    pub custom_amount: Option<u64>,
}

/// Validated inputs of one issuance run.
#[derive(Debug, Clone)]
pub struct IssuanceInput {
    pub project_id: String,
    pub calculation: CreditCalculation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuanceReceipt {
    pub project_id: String,
    pub calculation: CreditCalculation,
    pub transaction_hash: String,
    pub issued_at: DateTime<Utc>,
}

pub struct CreditIssuance {
    phases: [Phase; 2],
    credit_price: u64,
}

impl CreditIssuance {
    pub fn new(timing: &Timing, credit_price: u64) -> Result<Self> {
        Ok(Self {
            phases: [
                Phase::new(0, 40, 10, timing.calculation_step)?,
                Phase::new(40, 100, 15, timing.minting_step)?,
            ],
            credit_price,
        })
    }

    pub fn credit_price(&self) -> u64 {
        self.credit_price
    }
}

impl WorkflowKind for CreditIssuance {
    type Draft = IssuanceDraft;
    type Ready = IssuanceInput;
    type Output = IssuanceReceipt;

    const NAME: &'static str = "credit_issuance";
    const FIRST: WorkflowState = WorkflowState::Calculating;
    const SECOND: WorkflowState = WorkflowState::Minting;

    fn phases(&self) -> [Phase; 2] {
        self.phases
    }

    fn prepare(&self, draft: &IssuanceDraft) -> Result<IssuanceInput> {
        let project = draft
            .project
            .as_ref()
            .ok_or(RegistryError::MissingSelection)?;
        let calculation =
            CreditCalculation::for_project(project, draft.custom_amount, self.credit_price)?;
        Ok(IssuanceInput {
            project_id: project.id.clone(),
            calculation,
        })
    }

    fn synthesize(&self, ready: &IssuanceInput, metrics: &dyn MetricsProvider) -> IssuanceReceipt {
        IssuanceReceipt {
            project_id: ready.project_id.clone(),
            calculation: ready.calculation.clone(),
            transaction_hash: metrics.transaction_hash(),
            issued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CREDIT_PRICE;
    use crate::dataset::Dataset;

    fn project(id: &str) -> Project {
        Dataset::builtin().unwrap().find_project(id).unwrap().clone()
    }

    #[test]
    fn verified_project_gets_bonus() {
        // proj-001: 1200 available, NDVI 0.72, one site visit on record
        let calc =
            CreditCalculation::for_project(&project("proj-001"), None, DEFAULT_CREDIT_PRICE)
                .unwrap();
        assert_eq!(calc.base_credits, 1200);
        assert_eq!(calc.quality_multiplier, 0.72);
        assert_eq!(calc.verification_bonus, 0.1);
        assert_eq!(calc.total_credits, (1200.0 * 0.72 * 1.1f64).floor() as u64);
        assert_eq!(calc.total_credits, 950);
        assert_eq!(calc.estimated_value, 950 * 2100);
    }

    #[test]
    fn unverified_project_gets_no_bonus() {
        let mut p = project("proj-006");
        p.verification_history.clear();
        let calc = CreditCalculation::for_project(&p, None, 100).unwrap();
        assert_eq!(calc.verification_bonus, 0.0);
        assert_eq!(calc.total_credits, (380.0 * 0.65f64).floor() as u64);
    }

    #[test]
    fn custom_amount_caps_base() {
        let calc = CreditCalculation::for_project(&project("proj-009"), Some(500), 2100).unwrap();
        assert_eq!(calc.base_credits, 500);
        assert_eq!(calc.total_credits, (500.0 * 0.92 * 1.1f64).floor() as u64);
    }

    #[test]
    fn custom_amount_out_of_range() {
        let p = project("proj-009");
        for bad in [0, 841] {
            let err = CreditCalculation::for_project(&p, Some(bad), 2100).unwrap_err();
            assert!(matches!(
                err,
                RegistryError::InvalidAmount { available: 840, .. }
            ));
        }
    }

    #[test]
    fn oversized_credit_price_is_an_error() {
        let err =
            CreditCalculation::for_project(&project("proj-001"), None, u64::MAX).unwrap_err();
        assert!(matches!(err, RegistryError::Config(msg) if msg.contains("overflows")));
    }

    #[test]
    fn exhausted_project_rejected() {
        let err = CreditCalculation::for_project(&project("proj-005"), None, 2100).unwrap_err();
        assert!(matches!(err, RegistryError::NoCreditsAvailable(id) if id == "proj-005"));
    }

    #[test]
    fn prepare_requires_selection() {
        let kind = CreditIssuance::new(&Timing::default(), 2100).unwrap();
        assert!(matches!(
            kind.prepare(&IssuanceDraft::default()),
            Err(RegistryError::MissingSelection)
        ));
    }

    #[test]
    fn phases_end_at_full_progress() {
        let kind = CreditIssuance::new(&Timing::default(), 2100).unwrap();
        let [calculating, minting] = kind.phases();
        assert_eq!(calculating.values(), vec![0, 10, 20, 30, 40]);
        assert_eq!(minting.values(), vec![40, 55, 70, 85, 100]);
    }
}
