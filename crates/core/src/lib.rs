pub mod config;
pub mod datasource;
pub mod errors;
pub mod messages;
pub mod schema;
pub mod session;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use datasource::{Connector, ConnectorError, TabularPage};
pub use errors::BoundaryError;
pub use session::{InMemorySessionStore, SessionId, SessionRecord, SessionStore};
