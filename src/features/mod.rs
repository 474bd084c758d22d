pub mod media;
pub mod reports;
