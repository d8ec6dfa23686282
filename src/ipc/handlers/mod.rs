pub mod core;
pub mod grades;
pub mod groups;
pub mod lessons;
pub mod session;
pub mod students;
pub mod teachers;
