//! Serial port abstraction layer.
//!
//! [`PortHandle`] owns the lifecycle of one connection; [`SerialLink`] is the
//! seam between the channel algorithms and the transport, with a real
//! implementation ([`SyncSerialLink`]) and a scripted mock ([`MockLink`]).

mod error;
mod handle;
mod mock;
mod sync_port;
mod traits;

pub use error::PortError;
pub use handle::PortHandle;
pub use mock::{MockLink, MockStep};
pub use sync_port::SyncSerialLink;
pub use traits::{PortConfig, SerialLink};
