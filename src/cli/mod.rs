pub mod fleet;
pub mod script;
