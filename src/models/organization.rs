// src/models/organization.rs
//! Fabric organization naming.
//!
//! The network's scripts address an organization either by its number
//! (`"2"`) or by its name (`"org1"`, `"OrgStaff"`). This type derives the
//! cryptogen domain and the MSP id from either form.

use crate::error::{WalletError, WalletResult};
use std::fmt;

/// A validated organization name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Organization {
    name: String,
}

impl Organization {
    /// Parses an organization name.
    ///
    /// # Errors
    /// [`WalletError::Validation`] if the name is empty or contains anything
    /// other than ASCII alphanumerics, `-` and `_`. The name is used as a
    /// directory component, so this also rules out path traversal.
    pub fn parse(name: &str) -> WalletResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::Validation("organization must not be empty".into()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(WalletError::Validation(format!(
                "organization \"{}\" contains invalid characters",
                name
            )));
        }
        Ok(Organization { name: name.to_string() })
    }

    /// Name as given; also the wallet namespace directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_numbered(&self) -> bool {
        self.name.chars().all(|c| c.is_ascii_digit())
    }

    /// Cryptogen domain: `org2.example.com` for `"2"`, `org1.example.com` for `"org1"`.
    pub fn domain(&self) -> String {
        if self.is_numbered() {
            format!("org{}.example.com", self.name)
        } else {
            format!("{}.example.com", self.name)
        }
    }

    /// MSP id: `Org2MSP` for `"2"`, `Org1MSP` for `"org1"`, `OrgStaffMSP` for `"OrgStaff"`.
    pub fn msp_id(&self) -> String {
        if self.is_numbered() {
            return format!("Org{}MSP", self.name);
        }
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => format!("{}{}MSP", first.to_ascii_uppercase(), chars.as_str()),
            None => "MSP".to_string(),
        }
    }
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_organization() {
        let org = Organization::parse("2").unwrap();
        assert_eq!(org.msp_id(), "Org2MSP");
        assert_eq!(org.domain(), "org2.example.com");
        assert_eq!(org.name(), "2");
    }

    #[test]
    fn test_named_organization() {
        let org = Organization::parse("org1").unwrap();
        assert_eq!(org.msp_id(), "Org1MSP");
        assert_eq!(org.domain(), "org1.example.com");

        let staff = Organization::parse("OrgStaff").unwrap();
        assert_eq!(staff.msp_id(), "OrgStaffMSP");
    }

    #[test]
    fn test_rejects_traversal_and_empty() {
        assert!(matches!(Organization::parse(""), Err(WalletError::Validation(_))));
        assert!(matches!(Organization::parse("../org1"), Err(WalletError::Validation(_))));
        assert!(matches!(Organization::parse("org 1"), Err(WalletError::Validation(_))));
    }
}
