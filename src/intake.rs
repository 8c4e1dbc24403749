use crate::events::{LeadChange, LeadEvents};
use crate::lead::{Lead, NewLead, Plan, University, normalize_email};
use crate::store::{LeadStore, StoreError};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{info, warn};

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    #[serde(deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub university: String,
    #[serde(alias = "selected_plan")]
    pub plan: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

// An explicit null counts as a blank field rather than a malformed body.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("Please fill in all fields: {0} is required")]
    MissingField(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Unknown university: {0}")]
    UnknownUniversity(String),
    #[error("Unknown plan: {0}. Expected free or premium")]
    UnknownPlan(String),
    #[error("This email is already registered")]
    AlreadyRegistered,
    #[error("Something went wrong. Please try again.")]
    Store(#[source] StoreError),
}

impl SignupError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::InvalidEmail
                | Self::UnknownUniversity(_)
                | Self::UnknownPlan(_)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub title: &'static str,
    pub message: &'static str,
    pub next_step: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupOutcome {
    pub lead: Lead,
    pub confirmation: Confirmation,
}

pub fn validate(form: &SignupForm) -> Result<NewLead, SignupError> {
    let email = normalize_email(&form.email);
    if email.is_empty() {
        return Err(SignupError::MissingField("email"));
    }

    let university_code = form.university.trim();
    if university_code.is_empty() {
        return Err(SignupError::MissingField("university"));
    }

    let plan_code = form.plan.as_deref().map(str::trim).unwrap_or_default();
    if plan_code.is_empty() {
        return Err(SignupError::MissingField("plan"));
    }

    if !EMAIL_SHAPE.is_match(&email) {
        return Err(SignupError::InvalidEmail);
    }

    let university = university_code
        .parse::<University>()
        .map_err(|_| SignupError::UnknownUniversity(university_code.to_string()))?;
    let selected_plan = plan_code
        .parse::<Plan>()
        .map_err(|_| SignupError::UnknownPlan(plan_code.to_string()))?;

    Ok(NewLead {
        email,
        name: optional_text(form.name.as_deref()),
        phone: optional_text(form.phone.as_deref()),
        university,
        selected_plan,
    })
}

pub fn submit(
    store: &dyn LeadStore,
    events: &LeadEvents,
    form: &SignupForm,
) -> Result<SignupOutcome, SignupError> {
    let new_lead = validate(form)?;

    let lead = store.insert(new_lead).map_err(|error| match error {
        StoreError::Duplicate { email } => {
            info!(email = %email, "duplicate signup rejected");
            SignupError::AlreadyRegistered
        }
        other => {
            warn!(error = %other, backend = store.backend_name(), "failed to store lead");
            SignupError::Store(other)
        }
    })?;

    info!(
        email = %lead.email,
        plan = %lead.selected_plan,
        university = %lead.university,
        "lead registered"
    );
    events.notify(&LeadChange::Inserted {
        email: lead.email.clone(),
    });

    Ok(SignupOutcome {
        confirmation: confirmation_for(lead.selected_plan),
        lead,
    })
}

pub fn confirmation_for(plan: Plan) -> Confirmation {
    match plan {
        Plan::Free => Confirmation {
            title: "Account Created",
            message: "We are currently verifying university portals. You have been added to the priority waitlist.",
            next_step: "We'll email you when your account is ready.",
        },
        Plan::Premium => Confirmation {
            title: "Premium Request Received",
            message: "We are at capacity for manual verification. We have reserved your Priority Spot.",
            next_step: "We will email you a secure payment link when a slot opens.",
        },
    }
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
