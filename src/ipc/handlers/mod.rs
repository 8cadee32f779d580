pub mod cgpa;
pub mod core;
pub mod students;
