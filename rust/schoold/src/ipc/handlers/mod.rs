pub mod assignments;
pub mod attendance;
pub mod calc;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod gradebook;
pub mod grades;
pub mod students;
