//! Session table: port reservations, session membership and the
//! notifications each membership change commits.

pub mod port;
pub mod session;
pub mod table;

pub use port::BoundPort;
pub use session::{Session, SessionSnapshot, SessionState};
pub use table::{Departure, SessionTable, TableCounts};
