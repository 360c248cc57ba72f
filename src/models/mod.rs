//! Data models for Microsoft Graph directory objects

mod directory;
pub mod odata;
mod user;

pub use directory::{DirectoryObject, DirectoryRole, LicenseDetail, SubscribedSku};
pub use odata::ODataResponse;
pub use user::{User, UserField};
