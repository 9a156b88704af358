pub mod identity;
pub mod organization;
