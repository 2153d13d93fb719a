pub mod report;
pub mod research;
