use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);

/// Form fields shared by the sign-up and sign-in screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FirstName,
    LastName,
    EmailAddress,
    Password,
    BirthDate,
    Gender,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::EmailAddress => "emailAddress",
            Field::Password => "password",
            Field::BirthDate => "birthDate",
            Field::Gender => "gender",
        }
    }

    /// Resolves a wire field name. The backend historically reports the email
    /// field as `emailId`, so that spelling is accepted too.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "firstName" => Some(Field::FirstName),
            "lastName" => Some(Field::LastName),
            "emailAddress" | "emailId" | "email" => Some(Field::EmailAddress),
            "password" => Some(Field::Password),
            "birthDate" => Some(Field::BirthDate),
            "gender" => Some(Field::Gender),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenderOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub const GENDER_OPTIONS: &[GenderOption] = &[
    GenderOption {
        value: "male",
        label: "Male",
    },
    GenderOption {
        value: "female",
        label: "Female",
    },
    GenderOption {
        value: "other",
        label: "Other",
    },
];

pub fn gender_label(value: &str) -> Option<&'static str> {
    GENDER_OPTIONS
        .iter()
        .find(|option| option.value == value)
        .map(|option| option.label)
}
