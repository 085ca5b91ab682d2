use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// List item returned by `GET /api/users/`. The service omits
/// timestamps here; the client decorates them with local defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Partial update body for `PUT /api/users/{id}`. Absent fields are
/// omitted from the JSON entirely so the service treats them as
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.current_password.is_none()
            && self.new_password.is_none()
    }
}

/// Error body shape used by the service: `{"detail": ...}` where
/// `detail` is either a plain string or a list of per-field validation
/// errors (the 422 shape).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub loc: Vec<String>,
    pub msg: String,
}

/// Human label for a field path reported by the service.
fn field_label(loc: &[String]) -> String {
    let path = loc.join(".");
    for (needle, label) in [
        ("current_password", "current password"),
        ("new_password", "new password"),
        ("name", "name"),
        ("email", "email address"),
    ] {
        if path.contains(needle) {
            return label.to_string();
        }
    }
    path
}

impl ErrorDetail {
    /// Collapse the detail into one display string. Field errors are
    /// mapped through the label table and joined line by line.
    pub fn combined_message(&self) -> String {
        match self {
            Self::Message(message) => message.clone(),
            Self::Fields(fields) => fields
                .iter()
                .map(|field| format!("{}: {}", field_label(&field.loc), field.msg))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
