mod device;
mod device_assignment;
mod observation;
mod session;
mod site;
mod snapshot;
mod telemetry_record;
mod wake_event;

pub use device::DeviceRepository;
pub use device_assignment::DeviceAssignmentRepository;
pub use observation::ObservationRepository;
pub use session::SessionRepository;
pub use site::SiteRepository;
pub use snapshot::SnapshotRepository;
pub use telemetry_record::TelemetryRecordRepository;
pub use wake_event::WakeEventRepository;
