pub mod introspection;
pub mod report;
pub mod role;
