//! Directory user record and its fixed field list

use serde::{Deserialize, Serialize};

/// An Entra ID user as returned by `/users?$select=...`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
    pub mail: Option<String>,
    pub mobile_phone: Option<String>,
    pub account_enabled: Option<bool>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub company_name: Option<String>,
    pub usage_location: Option<String>,
    pub employee_id: Option<String>,
    pub employee_type: Option<String>,
    pub country: Option<String>,
    pub office_location: Option<String>,
    pub street_address: Option<String>,
}

impl User {
    /// Object id, or an empty string for records that came back without one
    pub fn object_id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Title used by the detail panel
    pub fn title(&self) -> String {
        self.display_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "User Details".to_string())
    }

    /// Subtitle used by the detail panel: principal name, then mail
    pub fn subtitle(&self) -> String {
        self.user_principal_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.mail.clone())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.account_enabled.unwrap_or(false)
    }

    /// Text searched by the quick search box
    pub fn search_text(&self) -> String {
        [
            UserField::DisplayName,
            UserField::Mail,
            UserField::UserPrincipalName,
            UserField::Department,
            UserField::CompanyName,
            UserField::OfficeLocation,
        ]
        .iter()
        .map(|f| f.text(self))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A column of the user table, in fixed display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserField {
    DisplayName,
    UserPrincipalName,
    Mail,
    #[serde(rename = "mobilePhone", alias = "mobile")]
    Mobile,
    AccountEnabled,
    JobTitle,
    Department,
    CompanyName,
    UsageLocation,
    EmployeeId,
    EmployeeType,
    Country,
    OfficeLocation,
    StreetAddress,
    Id,
}

impl UserField {
    pub const ALL: [UserField; 15] = [
        Self::DisplayName,
        Self::UserPrincipalName,
        Self::Mail,
        Self::Mobile,
        Self::AccountEnabled,
        Self::JobTitle,
        Self::Department,
        Self::CompanyName,
        Self::UsageLocation,
        Self::EmployeeId,
        Self::EmployeeType,
        Self::Country,
        Self::OfficeLocation,
        Self::StreetAddress,
        Self::Id,
    ];

    /// Columns shown before the operator changes anything
    pub const BASE: [UserField; 5] = [
        Self::DisplayName,
        Self::UserPrincipalName,
        Self::Mail,
        Self::Mobile,
        Self::AccountEnabled,
    ];

    /// Graph attribute name used in `$select`
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::DisplayName => "displayName",
            Self::UserPrincipalName => "userPrincipalName",
            Self::Mail => "mail",
            Self::Mobile => "mobilePhone",
            Self::AccountEnabled => "accountEnabled",
            Self::JobTitle => "jobTitle",
            Self::Department => "department",
            Self::CompanyName => "companyName",
            Self::UsageLocation => "usageLocation",
            Self::EmployeeId => "employeeId",
            Self::EmployeeType => "employeeType",
            Self::Country => "country",
            Self::OfficeLocation => "officeLocation",
            Self::StreetAddress => "streetAddress",
            Self::Id => "id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::DisplayName => "Display Name",
            Self::UserPrincipalName => "User Principal Name",
            Self::Mail => "Email",
            Self::Mobile => "Mobile",
            Self::AccountEnabled => "Enabled",
            Self::JobTitle => "Job Title",
            Self::Department => "Department",
            Self::CompanyName => "Company",
            Self::UsageLocation => "Usage Location",
            Self::EmployeeId => "Employee ID",
            Self::EmployeeType => "Employee Type",
            Self::Country => "Country",
            Self::OfficeLocation => "Office",
            Self::StreetAddress => "Address",
            Self::Id => "Object ID",
        }
    }

    /// String form of this field on a user; missing values are empty
    pub fn text(&self, user: &User) -> String {
        let value = match self {
            Self::AccountEnabled => {
                return user.account_enabled.map(|b| b.to_string()).unwrap_or_default();
            }
            Self::DisplayName => &user.display_name,
            Self::UserPrincipalName => &user.user_principal_name,
            Self::Mail => &user.mail,
            Self::Mobile => &user.mobile_phone,
            Self::JobTitle => &user.job_title,
            Self::Department => &user.department,
            Self::CompanyName => &user.company_name,
            Self::UsageLocation => &user.usage_location,
            Self::EmployeeId => &user.employee_id,
            Self::EmployeeType => &user.employee_type,
            Self::Country => &user.country,
            Self::OfficeLocation => &user.office_location,
            Self::StreetAddress => &user.street_address,
            Self::Id => &user.id,
        };
        value.clone().unwrap_or_default()
    }

    /// Comma separated `$select` list covering every field
    pub fn select_list() -> String {
        Self::ALL
            .iter()
            .map(|f| f.api_name())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}
