//! Explicit per-caller context: which company and employee a call acts for.

use serde::{Deserialize, Serialize};

/// Company used when no tenant is given.
pub const DEFAULT_COMPANY: &str = "default";

/// Header carrying the tenant on the backend lead API.
pub const COMPANY_HEADER: &str = "x-company-id";

/// Header carrying the acting employee on the backend lead API.
pub const EMPLOYEE_HEADER: &str = "x-employee-id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub company_id: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    /// Bearer token for the backend; never written to config files.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Session {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            employee_id: None,
            token: None,
        }
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_COMPANY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_not_serialized() {
        let session = Session::new("acme").with_employee("emp-7").with_token("secret");
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("acme"));
        assert!(json.contains("emp-7"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_default_company() {
        assert_eq!(Session::default().company_id, DEFAULT_COMPANY);
    }
}
