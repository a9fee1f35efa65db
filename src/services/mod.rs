pub mod coach_data;

pub use coach_data::SqlCoachData;
