//! Vendor onboarding wizard.
//!
//! Four steps (business, store, payout, review). Each step is validated
//! server-side before the wizard advances; the draft is kept in the browser
//! session so back/next navigation never loses input.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::warn;

use souk_core::{CategoryId, UserId};

use crate::api::types::StoreApplication;
use crate::models::session_keys;
use crate::services::validation::FieldErrors;

/// Wizard steps in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Business,
    Store,
    Payout,
    Review,
}

impl WizardStep {
    pub const ALL: [Self; 4] = [Self::Business, Self::Store, Self::Payout, Self::Review];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Store => "store",
            Self::Payout => "payout",
            Self::Review => "review",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Business => "Business details",
            Self::Store => "Store profile",
            Self::Payout => "Payout account",
            Self::Review => "Review & submit",
        }
    }

    /// 1-based position, for the progress indicator.
    #[must_use]
    pub const fn number(self) -> usize {
        self as usize + 1
    }

    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Business => Self::Store,
            Self::Store => Self::Payout,
            Self::Payout | Self::Review => Self::Review,
        }
    }

    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::Business | Self::Store => Self::Business,
            Self::Payout => Self::Store,
            Self::Review => Self::Payout,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WizardStep {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| WizardError::UnknownStep(s.to_string()))
    }
}

/// Wizard errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("complete the {} step first", .0.label())]
    Incomplete(WizardStep),
    #[error("unknown onboarding step: {0}")]
    UnknownStep(String),
}

// =============================================================================
// Step data
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDetails {
    pub business_name: String,
    pub business_type: String,
    pub tax_id: String,
    pub contact_phone: String,
}

impl BusinessDetails {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.required("business_name", "Business name", &self.business_name);
        errors.required("business_type", "Business type", &self.business_type);
        errors.alphanumeric_exact("tax_id", "GST number", &self.tax_id, 15);
        errors.digits_between("contact_phone", "Phone number", &self.contact_phone, 10, 10);
        errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDetails {
    pub store_name: String,
    pub description: String,
    pub category_id: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
}

impl StoreDetails {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.required("store_name", "Store name", &self.store_name);
        errors.required("description", "Description", &self.description);
        if self.category_id.trim().is_empty() {
            errors.push("category_id", "Choose a category");
        }
        errors.required("address", "Address", &self.address);
        errors.required("city", "City", &self.city);
        errors.digits_between("pincode", "PIN code", &self.pincode, 6, 6);
        errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub account_holder: String,
    pub account_number: String,
    pub bank_code: String,
}

impl PayoutDetails {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.required("account_holder", "Account holder", &self.account_holder);
        errors.digits_between("account_number", "Account number", &self.account_number, 9, 18);
        errors.alphanumeric_exact("bank_code", "IFSC code", &self.bank_code, 11);
        errors
    }
}

// =============================================================================
// Draft
// =============================================================================

/// Onboarding progress kept in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingDraft {
    pub step: WizardStep,
    pub business: BusinessDetails,
    pub store: StoreDetails,
    pub payout: PayoutDetails,
}

impl OnboardingDraft {
    /// Save the business step and advance.
    ///
    /// # Errors
    ///
    /// Returns the field errors; the input is kept either way.
    pub fn submit_business(&mut self, details: BusinessDetails) -> Result<(), FieldErrors> {
        let errors = details.validate();
        self.business = details;
        self.advance_if_valid(WizardStep::Business, errors)
    }

    /// Save the store step and advance.
    ///
    /// # Errors
    ///
    /// Returns the field errors; the input is kept either way.
    pub fn submit_store(&mut self, details: StoreDetails) -> Result<(), FieldErrors> {
        let errors = details.validate();
        self.store = details;
        self.advance_if_valid(WizardStep::Store, errors)
    }

    /// Save the payout step and advance to review.
    ///
    /// # Errors
    ///
    /// Returns the field errors; the input is kept either way.
    pub fn submit_payout(&mut self, details: PayoutDetails) -> Result<(), FieldErrors> {
        let errors = details.validate();
        self.payout = details;
        self.advance_if_valid(WizardStep::Payout, errors)
    }

    fn advance_if_valid(&mut self, step: WizardStep, errors: FieldErrors) -> Result<(), FieldErrors> {
        errors.finish(())?;
        self.step = step.next();
        Ok(())
    }

    /// Go back one step.
    pub const fn back(&mut self) {
        self.step = self.step.prev();
    }

    /// Jump to `step` if every earlier step is complete.
    ///
    /// # Errors
    ///
    /// Returns `WizardError::Incomplete` naming the first incomplete step.
    pub fn goto(&mut self, step: WizardStep) -> Result<(), WizardError> {
        if let Some(missing) = self.first_incomplete().filter(|m| *m < step) {
            return Err(WizardError::Incomplete(missing));
        }
        self.step = step;
        Ok(())
    }

    /// The first step whose data does not validate.
    #[must_use]
    pub fn first_incomplete(&self) -> Option<WizardStep> {
        if !self.business.validate().is_empty() {
            Some(WizardStep::Business)
        } else if !self.store.validate().is_empty() {
            Some(WizardStep::Store)
        } else if !self.payout.validate().is_empty() {
            Some(WizardStep::Payout)
        } else {
            None
        }
    }

    /// Build the application to submit.
    ///
    /// # Errors
    ///
    /// Returns `WizardError::Incomplete` if any step does not validate.
    pub fn to_application(&self, owner_id: UserId) -> Result<StoreApplication, WizardError> {
        if let Some(missing) = self.first_incomplete() {
            return Err(WizardError::Incomplete(missing));
        }
        Ok(StoreApplication {
            owner_id,
            business_name: self.business.business_name.trim().to_string(),
            business_type: self.business.business_type.trim().to_string(),
            tax_id: self.business.tax_id.trim().to_ascii_uppercase(),
            contact_phone: self.business.contact_phone.trim().to_string(),
            store_name: self.store.store_name.trim().to_string(),
            description: self.store.description.trim().to_string(),
            category_id: CategoryId::new(self.store.category_id.trim()),
            address: self.store.address.trim().to_string(),
            city: self.store.city.trim().to_string(),
            pincode: self.store.pincode.trim().to_string(),
            account_holder: self.payout.account_holder.trim().to_string(),
            account_number: self.payout.account_number.trim().to_string(),
            bank_code: self.payout.bank_code.trim().to_ascii_uppercase(),
        })
    }
}

// =============================================================================
// Session storage
// =============================================================================

/// The session's draft, or a fresh one.
pub async fn load_draft(session: &Session) -> OnboardingDraft {
    session
        .get::<OnboardingDraft>(session_keys::ONBOARDING_DRAFT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

pub async fn save_draft(session: &Session, draft: &OnboardingDraft) {
    if let Err(e) = session.insert(session_keys::ONBOARDING_DRAFT, draft).await {
        warn!(error = %e, "Failed to save onboarding draft");
    }
}

pub async fn clear_draft(session: &Session) {
    if let Err(e) = session
        .remove_value(session_keys::ONBOARDING_DRAFT)
        .await
    {
        warn!(error = %e, "Failed to clear onboarding draft");
    }
}
