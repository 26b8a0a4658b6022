use serde::{Deserialize, Serialize};

pub const MIN_PHONE_LENGTH: usize = 10;

pub const EMAIL_ERROR: &str = "Please enter a valid email address";
pub const PHONE_ERROR: &str = "Please enter a valid phone number";

/// What the visitor typed into the gate. Never normalized or stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub phone: String,
}

impl Contact {
    pub fn new(email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            phone: phone.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactField {
    Email,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: ContactField,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateValidation {
    pub email_valid: bool,
    pub phone_valid: bool,
    pub errors: Vec<FieldError>,
}

impl GateValidation {
    pub fn accepted(&self) -> bool {
        self.email_valid && self.phone_valid
    }

    pub fn error_for(&self, field: ContactField) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    }
}

/// Checks both fields independently so both errors surface together.
pub fn validate(contact: &Contact) -> GateValidation {
    let email_valid = !contact.email.is_empty() && contact.email.contains('@');
    let phone_valid = contact.phone.chars().count() >= MIN_PHONE_LENGTH;

    let mut errors = Vec::new();
    if !email_valid {
        errors.push(FieldError {
            field: ContactField::Email,
            message: EMAIL_ERROR,
        });
    }
    if !phone_valid {
        errors.push(FieldError {
            field: ContactField::Phone,
            message: PHONE_ERROR,
        });
    }

    GateValidation {
        email_valid,
        phone_valid,
        errors,
    }
}
