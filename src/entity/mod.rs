pub mod resource;
pub mod user;
