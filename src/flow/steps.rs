//! Wizard steps — named step sequences chosen by onboarding mode.
//!
//! Steps are identifiers, never bare ordinals: the same name means the
//! same screen in every mode, so a restored "current step" is always
//! unambiguous.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::services::OperatorIdentity;

/// A named wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Intro,
    Household,
    LandlordDetails,
    Documents,
    Tenants,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Intro => "intro",
            Self::Household => "household",
            Self::LandlordDetails => "landlord_details",
            Self::Documents => "documents",
            Self::Tenants => "tenants",
        };
        write!(f, "{s}")
    }
}

/// Which wizard variant the operator is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingMode {
    FirstTime,
    AdditionalHousehold,
}

impl OnboardingMode {
    /// The step sequence for this mode. Landlord details are collected
    /// only on the first pass; returning landlords get an intro instead.
    pub fn steps(&self) -> &'static [StepId] {
        use StepId::*;
        match self {
            Self::FirstTime => &[Household, LandlordDetails, Documents, Tenants],
            Self::AdditionalHousehold => &[Intro, Household, Documents, Tenants],
        }
    }

    /// Pick the mode from the operator's session: anyone not yet onboarded
    /// (or with no households) goes through the first-time sequence.
    pub fn for_identity(identity: &OperatorIdentity) -> Self {
        if !identity.is_onboarded || identity.household_count == 0 {
            Self::FirstTime
        } else {
            Self::AdditionalHousehold
        }
    }
}

impl std::fmt::Display for OnboardingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstTime => write!(f, "first_time"),
            Self::AdditionalHousehold => write!(f, "additional_household"),
        }
    }
}

/// Cursor over a mode's step sequence. The position is always within the
/// sequence bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCursor {
    mode: OnboardingMode,
    index: usize,
}

impl StepCursor {
    /// Cursor at the first step of the mode's sequence.
    pub fn first(mode: OnboardingMode) -> Self {
        Self { mode, index: 0 }
    }

    /// Cursor positioned at `step`, or `None` when the step does not
    /// appear in this mode's sequence.
    pub fn at(mode: OnboardingMode, step: StepId) -> Option<Self> {
        mode.steps()
            .iter()
            .position(|s| *s == step)
            .map(|index| Self { mode, index })
    }

    pub fn current(&self) -> StepId {
        self.mode.steps()[self.index]
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.mode.steps().len()
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total()
    }

    /// Move to the next step. The caller checks the gate condition first.
    pub fn advance(&mut self) -> Result<StepId, FlowError> {
        if self.is_last() {
            return Err(FlowError::AtFinalStep);
        }
        self.index += 1;
        Ok(self.current())
    }

    /// Move to the previous step. Never re-validates the step being left.
    pub fn back(&mut self) -> Result<StepId, FlowError> {
        if self.is_first() {
            return Err(FlowError::AtFirstStep);
        }
        self.index -= 1;
        Ok(self.current())
    }
}
