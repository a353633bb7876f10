pub mod analyze;
pub mod extract;
pub mod inventory;
pub mod patterns;
pub mod status;
pub mod tag;
