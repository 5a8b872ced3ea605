pub mod device_handle;
pub mod ingest_handle;
pub mod session_handle;
pub mod site_handle;
pub mod snapshot_handle;
pub mod sse_handle;

pub use device_handle::*;
pub use ingest_handle::*;
pub use session_handle::*;
pub use site_handle::*;
pub use snapshot_handle::*;
pub use sse_handle::*;
