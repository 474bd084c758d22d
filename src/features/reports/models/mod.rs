mod report;

#[cfg(test)]
pub(crate) use report::fixtures;
pub use report::{
    Coordinates, Department, Report, ReportDraft, ReportPatch, ReportPriority, ReportStatus,
    ReportTag,
};
