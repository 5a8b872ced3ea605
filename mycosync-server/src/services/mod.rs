pub mod device_service;
pub mod locf_service;
pub mod scheduler_service;
pub mod snapshot_service;
pub mod wake_service;

pub use device_service::DeviceService;
pub use locf_service::LocfService;
pub use scheduler_service::{SchedulerService, SnapshotDecision};
pub use snapshot_service::SnapshotService;
pub use wake_service::{WakeReport, WakeService};
