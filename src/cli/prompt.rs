use crate::intake::SignupForm;
use crate::lead::{Plan, University};
use anyhow::{Context, Result};
use dialoguer::{Input, Select, theme::ColorfulTheme};

/// Fills the gaps of a partially specified signup interactively.
pub fn complete_signup_form(mut form: SignupForm) -> Result<SignupForm> {
    let theme = ColorfulTheme::default();

    if form.email.trim().is_empty() {
        form.email = Input::with_theme(&theme)
            .with_prompt("Email address")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Email is required")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .context("Failed to read email")?;
    }

    if form.university.trim().is_empty() {
        let labels = University::ALL
            .iter()
            .map(|university| university.label())
            .collect::<Vec<_>>();
        let index = Select::with_theme(&theme)
            .with_prompt("Intended university")
            .default(0)
            .items(&labels)
            .interact()
            .context("Failed to select university")?;

        form.university = University::ALL
            .get(index)
            .copied()
            .unwrap_or(University::Other)
            .code()
            .to_string();
    }

    if form.plan.as_deref().is_none_or(|plan| plan.trim().is_empty()) {
        let plans = [Plan::Free, Plan::Premium];
        let index = Select::with_theme(&theme)
            .with_prompt("Plan")
            .default(0)
            .items(&["Free", "Premium"])
            .interact()
            .context("Failed to select plan")?;

        form.plan = plans.get(index).map(|plan| plan.as_str().to_string());
    }

    if form.name.is_none() {
        let name: String = Input::with_theme(&theme)
            .with_prompt("Name (optional)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read name")?;
        form.name = Some(name);
    }

    if form.phone.is_none() {
        let phone: String = Input::with_theme(&theme)
            .with_prompt("Phone (optional)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read phone")?;
        form.phone = Some(phone);
    }

    Ok(form)
}
