//! Account commands.

use super::prompt_password;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use gotrue_types::{FieldUpdate, UserAttributes};
use serde_json::json;
use ymir::AuthEngine;

/// Requested changes to the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub clear_phone: bool,
    pub password: bool,
}

impl UpdateRequest {
    /// Turn the flags into attributes. `new_password` is only read when a
    /// password change was asked for.
    fn attributes(
        &self,
        new_password: impl FnOnce() -> Result<String>,
    ) -> Result<UserAttributes> {
        let phone = if self.clear_phone {
            FieldUpdate::Clear
        } else {
            FieldUpdate::from(self.phone.clone())
        };
        let password = if self.password {
            FieldUpdate::Set(new_password()?)
        } else {
            FieldUpdate::Keep
        };

        let attributes = UserAttributes {
            email: FieldUpdate::from(self.email.clone()),
            phone,
            password,
            ..Default::default()
        };
        if attributes.is_empty() {
            anyhow::bail!("Nothing to update. Pass --email, --phone, --clear-phone or --password");
        }
        Ok(attributes)
    }
}

/// Update the signed-in user.
pub async fn update(
    engine: &AuthEngine,
    request: UpdateRequest,
    format: &OutputFormat,
) -> Result<()> {
    let attributes = request.attributes(|| {
        let password = prompt_password("New password: ")?;
        let confirm = prompt_password("Confirm password: ")?;
        if password != confirm {
            anyhow::bail!("Passwords do not match");
        }
        Ok(password)
    })?;

    let user = engine
        .update_user(&attributes)
        .await
        .context("Update failed")?;

    match format {
        OutputFormat::Text => {
            println!("Updated user {}", user.id);
            if let Some(email) = &user.email {
                output::print_row("Email", email);
            }
            if let Some(phone) = &user.phone {
                output::print_row("Phone", phone);
            }
        }
        OutputFormat::Json => output::print_json(&json!({
            "status": "updated",
            "user": user,
        })),
    }
    Ok(())
}
