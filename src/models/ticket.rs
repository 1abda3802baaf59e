use serde::{Deserialize, Serialize};

pub const MAX_SUBJECT_LEN: usize = 120;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketCategory {
    Vehicle,
    Route,
    Other,
}

impl TicketCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "vehicle" => Some(Self::Vehicle),
            "route" => Some(Self::Route),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub driver_id: String,
    pub subject: String,
    pub category: TicketCategory,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
}

/// Inline field errors for the ticket form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TicketErrors {
    pub subject: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl TicketErrors {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.category.is_none() && self.description.is_none()
    }
}

pub struct TicketDraft<'a> {
    pub subject: &'a str,
    pub category: &'a str,
    pub description: &'a str,
}

impl TicketDraft<'_> {
    pub fn validate(&self) -> Result<(String, TicketCategory, String), TicketErrors> {
        let mut errors = TicketErrors::default();

        let subject = self.subject.trim();
        if subject.is_empty() {
            errors.subject = Some("Subject is required".into());
        } else if subject.chars().count() > MAX_SUBJECT_LEN {
            errors.subject = Some(format!("Subject must be at most {MAX_SUBJECT_LEN} characters"));
        }

        let category = TicketCategory::parse(self.category);
        if category.is_none() {
            errors.category = Some("Pick a category".into());
        }

        let description = self.description.trim();
        if description.is_empty() {
            errors.description = Some("Describe the problem".into());
        }

        match category {
            Some(category) if errors.is_empty() => {
                Ok((subject.to_string(), category, description.to_string()))
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_field_error() {
        let errors = TicketDraft {
            subject: "  ",
            category: "engine",
            description: "",
        }
        .validate()
        .unwrap_err();
        assert!(errors.subject.is_some());
        assert!(errors.category.is_some());
        assert!(errors.description.is_some());
    }

    #[test]
    fn trims_valid_input() {
        let (subject, category, description) = TicketDraft {
            subject: " Flat tyre ",
            category: "vehicle",
            description: " rear left ",
        }
        .validate()
        .unwrap();
        assert_eq!(subject, "Flat tyre");
        assert_eq!(category, TicketCategory::Vehicle);
        assert_eq!(description, "rear left");
    }
}
