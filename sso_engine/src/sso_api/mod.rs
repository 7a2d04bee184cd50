pub mod errors;
pub mod sso_flow_api;
pub mod sso_objects;
