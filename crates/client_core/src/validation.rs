//! Pure form validation. Every pass recomputes the full error map.

use std::{collections::BTreeMap, fmt, sync::LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use shared::domain::Field;

use crate::form::{SignInForm, SignUpForm};

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub minimum_age_years: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            minimum_age_years: 13,
        }
    }
}

/// Field name to human-readable message. Fields without an error are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Whole years between `birth_date` and `today`, counted on the calendar:
/// the year difference, minus one if this year's birthday is still ahead.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

pub fn validate_sign_up(
    form: &SignUpForm,
    today: NaiveDate,
    rules: ValidationRules,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if form.first_name.trim().is_empty() {
        errors.insert(Field::FirstName, "First name is required");
    }
    if form.last_name.trim().is_empty() {
        errors.insert(Field::LastName, "Last name is required");
    }
    check_email(&form.email_address, &mut errors);
    check_password(&form.password, &mut errors);

    match form.birth_date {
        None => errors.insert(Field::BirthDate, "Birth date is required"),
        Some(birth_date) => {
            let minimum = i32::try_from(rules.minimum_age_years).unwrap_or(i32::MAX);
            if age_on(birth_date, today) < minimum {
                errors.insert(
                    Field::BirthDate,
                    format!("You must be at least {minimum} years old"),
                );
            }
        }
    }

    if form.gender.trim().is_empty() {
        errors.insert(Field::Gender, "Gender is required");
    }

    errors
}

pub fn validate_sign_in(form: &SignInForm) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_email(&form.email_address, &mut errors);
    check_password(&form.password, &mut errors);
    errors
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.trim().is_empty() {
        errors.insert(Field::EmailAddress, "Email is required");
    } else if !is_valid_email(email) {
        errors.insert(Field::EmailAddress, "Email is invalid");
    }
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.is_empty() {
        errors.insert(Field::Password, "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            Field::Password,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
