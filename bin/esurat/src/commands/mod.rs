pub mod context;
pub mod login;
pub mod resource;
pub mod superadmin;
