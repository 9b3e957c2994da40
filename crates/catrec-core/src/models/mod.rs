pub mod credentials;
pub mod identifier;
pub mod range;
pub mod report;
