mod device;
mod device_assignment;
mod observation;
mod session;
mod site;
mod snapshot;
mod telemetry_record;
mod wake_event;

pub use device::{Device, DeviceTable};
pub use device_assignment::{DeviceAssignment, DeviceAssignmentTable};
pub use observation::{Observation, ObservationTable, TransferStatus};
pub use session::{Session, SessionStatus, SessionTable};
pub use site::{Site, SiteTable};
pub use snapshot::{DeviceState, ResolvedObservation, ResolvedTelemetry, Snapshot, SnapshotTable};
pub use telemetry_record::{TelemetryRecord, TelemetryRecordTable};
pub use wake_event::{WakeEvent, WakeEventTable, WakeStatus};

pub trait Table {
    /// The name of the table
    fn name(&self) -> &'static str;

    /// The SQL statement to create the table
    fn create(&self) -> String;

    /// The SQL statement to dispose the table
    fn dispose(&self) -> String;

    /// The dependencies of the table
    fn dependencies(&self) -> Vec<&'static str>;
}
