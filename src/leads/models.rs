/// Lead intake data models
use crate::forms;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

pub const CONTACT_PROJECT_TYPES: [&str; 3] =
    ["New pool construction", "Renovation", "Maintenance/Service"];

pub const QUOTE_SERVICE_TYPES: [&str; 3] =
    ["New Pool Consult", "Pool Replacement", "Pool Removal"];

/// Which public form produced a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadKind {
    Contact,
    ProductInquiry,
    QuoteRequest,
}

impl LeadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadKind::Contact => "contact",
            LeadKind::ProductInquiry => "product_inquiry",
            LeadKind::QuoteRequest => "quote_request",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "contact" => Some(LeadKind::Contact),
            "product_inquiry" | "product-inquiry" | "inquiry" => Some(LeadKind::ProductInquiry),
            "quote_request" | "quote-request" | "quote" => Some(LeadKind::QuoteRequest),
            _ => None,
        }
    }
}

impl fmt::Display for LeadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted lead. Only the read flag changes after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub id: Uuid,
    pub kind: LeadKind,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    /// Kind-specific fields (town, project type, size, city, ...)
    pub details: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    pub fn detail_list(&self, key: &str) -> Vec<String> {
        self.details
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn one_of(value: &str, allowed: &[&str], code: &'static str, message: &'static str) -> Result<(), ValidationError> {
    // Blank values are reported by the presence check
    if value.is_empty() || allowed.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    }
}

fn known_project_type(value: &str) -> Result<(), ValidationError> {
    one_of(value, &CONTACT_PROJECT_TYPES, "project_type", "Project Type is not recognised")
}

fn known_service_type(value: &str) -> Result<(), ValidationError> {
    one_of(value, &QUOTE_SERVICE_TYPES, "service_type", "Service Type is not recognised")
}

/// General contact form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Town is required"))]
    pub town: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Phone Number is required"))]
    pub phone_number: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Project Type is required"),
        custom(function = "known_project_type")
    )]
    pub project_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub honey: Option<String>,
}

/// Product detail page inquiry
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInquirySubmission {
    #[serde(default, alias = "product")]
    #[validate(length(min = 1, message = "Product is required"))]
    pub product_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub honey: Option<String>,
}

/// Quote request, optionally tied to a product
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequestSubmission {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Service Type is required"),
        custom(function = "known_service_type")
    )]
    pub service_type: String,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub selected_sizes: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "product")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub honey: Option<String>,
}

/// Any of the three public lead forms
#[derive(Debug, Clone)]
pub enum LeadSubmission {
    Contact(ContactSubmission),
    ProductInquiry(ProductInquirySubmission),
    QuoteRequest(QuoteRequestSubmission),
}

impl LeadSubmission {
    pub fn kind(&self) -> LeadKind {
        match self {
            LeadSubmission::Contact(_) => LeadKind::Contact,
            LeadSubmission::ProductInquiry(_) => LeadKind::ProductInquiry,
            LeadSubmission::QuoteRequest(_) => LeadKind::QuoteRequest,
        }
    }

    /// True when the hidden honeypot field was filled in
    pub fn is_spam(&self) -> bool {
        let honey = match self {
            LeadSubmission::Contact(s) => &s.honey,
            LeadSubmission::ProductInquiry(s) => &s.honey,
            LeadSubmission::QuoteRequest(s) => &s.honey,
        };
        honey.as_deref().is_some_and(|h| !h.trim().is_empty())
    }

    /// Trim every text field so blanks count as missing
    pub fn normalized(self) -> Self {
        fn t(s: String) -> String {
            s.trim().to_string()
        }
        match self {
            LeadSubmission::Contact(s) => LeadSubmission::Contact(ContactSubmission {
                name: t(s.name),
                town: t(s.town),
                phone_number: t(s.phone_number),
                email: t(s.email).to_lowercase(),
                project_type: t(s.project_type),
                message: t(s.message),
                honey: s.honey,
            }),
            LeadSubmission::ProductInquiry(s) => {
                LeadSubmission::ProductInquiry(ProductInquirySubmission {
                    product_id: t(s.product_id),
                    name: t(s.name),
                    email: t(s.email).to_lowercase(),
                    phone: t(s.phone),
                    size: t(s.size),
                    description: t(s.description),
                    honey: s.honey,
                })
            }
            LeadSubmission::QuoteRequest(s) => LeadSubmission::QuoteRequest(QuoteRequestSubmission {
                name: t(s.name),
                city: t(s.city),
                email: t(s.email).to_lowercase(),
                phone: t(s.phone),
                service_type: t(s.service_type),
                selected_sizes: s.selected_sizes,
                message: t(s.message),
                product_id: forms::blank_as_none(s.product_id),
                honey: s.honey,
            }),
        }
    }

    /// Every failed field check, in form order, joined into one message
    pub fn validation_message(&self) -> Option<String> {
        let (result, order): (Result<(), ValidationErrors>, &[&str]) = match self {
            LeadSubmission::Contact(s) => (
                s.validate(),
                &["name", "town", "phone_number", "email", "project_type"],
            ),
            LeadSubmission::ProductInquiry(s) => {
                (s.validate(), &["product_id", "name", "email", "phone"])
            }
            LeadSubmission::QuoteRequest(s) => (
                s.validate(),
                &["name", "city", "email", "phone", "service_type"],
            ),
        };
        result.err().map(|errors| join_messages(&errors, order))
    }
}

fn join_messages(errors: &ValidationErrors, order: &[&str]) -> String {
    let mut fields: Vec<(usize, String)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let field: &str = field.as_ref();
            let rank = order.iter().position(|f| *f == field).unwrap_or(order.len());
            // First failure per field; "required" wins over format checks
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            (rank, message)
        })
        .collect();
    fields.sort();
    fields
        .into_iter()
        .map(|(_, message)| message)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Admin listing filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient_opt_bool")]
    pub read: Option<bool>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub items: Vec<LeadRecord>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(json: serde_json::Value) -> LeadSubmission {
        LeadSubmission::Contact(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_blank_contact_fields_are_all_reported() {
        let sub = contact(serde_json::json!({
            "name": "  ",
            "email": "someone@example.com",
            "projectType": "Renovation"
        }))
        .normalized();

        assert_eq!(
            sub.validation_message().as_deref(),
            Some("Name is required, Town is required, Phone Number is required")
        );
    }

    #[test]
    fn test_vocabulary_is_enforced() {
        let sub = contact(serde_json::json!({
            "name": "Sam",
            "town": "Tulsa",
            "phoneNumber": "555",
            "email": "sam@example.com",
            "projectType": "Hot tub"
        }))
        .normalized();
        assert_eq!(
            sub.validation_message().as_deref(),
            Some("Project Type is not recognised")
        );
    }

    #[test]
    fn test_valid_contact_passes_and_lowercases_email() {
        let sub = contact(serde_json::json!({
            "name": "Sam",
            "town": "Tulsa",
            "phoneNumber": "555",
            "email": " Sam@Example.com ",
            "projectType": "New pool construction"
        }))
        .normalized();
        assert!(sub.validation_message().is_none());
        match sub {
            LeadSubmission::Contact(s) => assert_eq!(s.email, "sam@example.com"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_honeypot() {
        assert!(contact(serde_json::json!({ "honey": "bot" })).is_spam());
        assert!(!contact(serde_json::json!({ "honey": "  " })).is_spam());
        assert!(!contact(serde_json::json!({})).is_spam());
    }

    #[test]
    fn test_quote_sizes_accept_string_or_list() {
        let q: QuoteRequestSubmission =
            serde_json::from_value(serde_json::json!({ "selectedSizes": "12x24, 16x32" })).unwrap();
        assert_eq!(q.selected_sizes, vec!["12x24", "16x32"]);

        let q: QuoteRequestSubmission =
            serde_json::from_value(serde_json::json!({ "selectedSizes": ["14x28"] })).unwrap();
        assert_eq!(q.selected_sizes, vec!["14x28"]);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(LeadKind::parse("quote-request"), Some(LeadKind::QuoteRequest));
        assert_eq!(LeadKind::parse("contact"), Some(LeadKind::Contact));
        assert_eq!(LeadKind::parse("other"), None);
    }
}
