pub mod data;
pub mod legal;
pub mod resume;
