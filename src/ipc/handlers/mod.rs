pub mod backup_exchange;
pub mod classes;
pub mod core;
pub mod exams;
pub mod reports;
pub mod seating;
pub mod setup;
pub mod students;
pub mod subjects;
pub mod teachers;
