pub mod analytics;
pub mod attempts;
pub mod audit;
pub mod bookings;
pub mod categories;
pub mod certificates;
pub mod connection;
pub mod exams;
pub mod models;
pub mod payments;
pub mod questions;
pub mod redis;
#[cfg(test)]
pub mod test_support;
pub mod users;

pub use connection::DbClient;
