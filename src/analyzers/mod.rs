//! Road-segment stability analytics.
//!
//! Reads normalized segment aggregates for the report date and the same
//! weekday one week earlier, compares them, scores how consistently
//! different vehicles measure each segment, and assembles the report.

pub mod comparison;
pub mod grade;
pub mod repeatability;
pub mod report;
pub mod segments;
pub mod vehicles;
