pub mod config;
mod connection;
mod dispatcher;
mod live_connections;
mod session;
pub mod state;
mod supervisor;

pub use config::ServerConfig;
pub use connection::handle_connection;
pub use dispatcher::{dispatch, Flow};
pub use live_connections::{ConnectionGuard, LiveConnections};
pub use session::ConnectionSession;
pub use state::ServerState;
pub use supervisor::{run_server, ChordServer};
