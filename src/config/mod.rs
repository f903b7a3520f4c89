pub mod prompt;
pub mod tier;
