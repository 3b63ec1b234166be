//! Admin protocol: newline-delimited JSON over a loopback TCP socket.
//!
//! Sessions start unauthenticated. `authenticate` with the superuser key
//! unlocks the privileged commands for the rest of the connection.

pub mod commands;
pub mod importer;
pub mod protocol;
pub mod server;
pub mod session;

pub use commands::{AdminContext, Method};
pub use importer::{ImportFormat, Importer, Ogr2OgrConverter, ShapefileConverter};
pub use protocol::{AdminRequest, Frame, RequestData};
pub use server::{is_local_peer, serve_session, AdminServer, SessionLimits};
pub use session::{Outcome, Session, SessionState};
