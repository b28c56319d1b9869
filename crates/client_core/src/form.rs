use chrono::NaiveDate;
use shared::{
    domain::Field,
    protocol::{SignInRequest, SignUpRequest},
};
use thiserror::Error;

use crate::validation::{validate_sign_in, validate_sign_up, ValidationErrors, ValidationRules};

pub const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(Option<NaiveDate>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(Some(value))
    }
}

impl From<Option<NaiveDate>> for FieldValue {
    fn from(value: Option<NaiveDate>) -> Self {
        FieldValue::Date(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("form has no field '{0}'")]
    UnknownField(Field),
    #[error("field '{0}' expects text, not a date")]
    ExpectedText(Field),
    #[error("invalid birth date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

fn normalize_text(field: Field, raw: &str) -> String {
    let trimmed = raw.trim();
    if field == Field::EmailAddress {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

fn parse_birth_date(raw: &str) -> Result<Option<NaiveDate>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, BIRTH_DATE_FORMAT)
        .map(Some)
        .map_err(|_| FieldError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub password: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
}

impl SignUpForm {
    /// Stores a normalized value. Never validates.
    pub fn update_field(
        &mut self,
        field: Field,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        match value.into() {
            FieldValue::Date(date) if field == Field::BirthDate => self.birth_date = date,
            FieldValue::Date(_) => return Err(FieldError::ExpectedText(field)),
            FieldValue::Text(raw) => match field {
                Field::BirthDate => self.birth_date = parse_birth_date(&raw)?,
                Field::FirstName => self.first_name = normalize_text(field, &raw),
                Field::LastName => self.last_name = normalize_text(field, &raw),
                Field::EmailAddress => self.email_address = normalize_text(field, &raw),
                Field::Password => self.password = normalize_text(field, &raw),
                Field::Gender => self.gender = normalize_text(field, &raw),
            },
        }
        Ok(())
    }

    pub fn validate(&self, today: NaiveDate, rules: ValidationRules) -> ValidationErrors {
        validate_sign_up(self, today, rules)
    }

    /// Wire payload; `None` until a birth date has been picked.
    pub fn to_request(&self) -> Option<SignUpRequest> {
        Some(SignUpRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_address: self.email_address.clone(),
            password: self.password.clone(),
            birth_date: self.birth_date?,
            gender: self.gender.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    pub email_address: String,
    pub password: String,
}

impl SignInForm {
    pub fn update_field(
        &mut self,
        field: Field,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        if !matches!(field, Field::EmailAddress | Field::Password) {
            return Err(FieldError::UnknownField(field));
        }
        let FieldValue::Text(raw) = value.into() else {
            return Err(FieldError::ExpectedText(field));
        };
        let normalized = normalize_text(field, &raw);
        if field == Field::EmailAddress {
            self.email_address = normalized;
        } else {
            self.password = normalized;
        }
        Ok(())
    }

    pub fn validate(&self) -> ValidationErrors {
        validate_sign_in(self)
    }

    pub fn to_request(&self) -> SignInRequest {
        SignInRequest {
            email_address: self.email_address.clone(),
            password: self.password.clone(),
        }
    }
}
