mod analytics_dto;
mod report_dto;

pub use analytics_dto::*;
pub use report_dto::*;
