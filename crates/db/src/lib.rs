pub mod connection;
pub mod connector;
pub mod fixtures;
pub mod migrations;

pub use connection::{connect, connect_with_settings, DbPool};
pub use connector::SqlConnector;
pub use fixtures::{seed_appointments, AppointmentSeed};
