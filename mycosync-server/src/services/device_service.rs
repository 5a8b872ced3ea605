use std::sync::Arc;

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::configs::Storage;
use crate::errors::{ApiError, DeviceError};
use crate::models::{Device, DeviceAssignment};
use crate::repositories::{DeviceAssignmentRepository, DeviceRepository, SiteRepository};

/// Canonical hardware address form: uppercase hex, no separators.
pub fn normalize_mac(raw: &str) -> Result<String, DeviceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();

    if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DeviceError::InvalidMacAddress);
    }

    Ok(cleaned.to_ascii_uppercase())
}

pub struct DeviceService {
    storage: Arc<Storage>,
    devices: DeviceRepository,
    assignments: DeviceAssignmentRepository,
    sites: SiteRepository,
}

impl DeviceService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            devices: DeviceRepository::new(storage.clone()),
            assignments: DeviceAssignmentRepository::new(storage.clone()),
            sites: SiteRepository::new(storage.clone()),
            storage,
        }
    }

    pub async fn register_device(
        &self,
        mac_address: &str,
        name: &str,
        wake_schedule: Option<String>,
        wake_interval_minutes: i32,
        position: Value,
        site_id: Option<i32>,
        program_id: Option<i32>,
        now: OffsetDateTime,
    ) -> Result<Device, ApiError> {
        let mac_address = normalize_mac(mac_address)?;

        if self.devices.find_by_mac(&mac_address).await?.is_some() {
            return Err(DeviceError::MacAddressExists.into());
        }

        if let Some(site_id) = site_id {
            if self.sites.find_by_id(site_id).await?.is_none() {
                return Err(DeviceError::SiteNotFound.into());
            }
        }

        let next_wake_at = site_id
            .is_some()
            .then(|| now + Duration::minutes(wake_interval_minutes as i64));

        let device = Device {
            id: 0,
            site_id,
            program_id,
            mac_address,
            name: name.to_string(),
            wake_schedule,
            wake_interval_minutes,
            active: true,
            position,
            last_wake_at: None,
            next_wake_at,
        };

        let mut tx = self.storage.get_pool().begin().await?;
        let device_id = self.devices.create(&device, &mut tx).await?;

        // Ledger and direct reference are written in one transaction so the
        // two representations cannot diverge.
        if let Some(site_id) = site_id {
            self.assignments
                .create(
                    &DeviceAssignment {
                        id: 0,
                        device_id,
                        site_id,
                        program_id,
                        assigned_at: now,
                        unassigned_at: None,
                    },
                    &mut tx,
                )
                .await?;
        }
        tx.commit().await?;

        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| DeviceError::DeviceNotFound.into())
    }

    pub async fn assign_device(
        &self,
        device_id: i32,
        site_id: i32,
        program_id: Option<i32>,
        now: OffsetDateTime,
    ) -> Result<Device, ApiError> {
        let device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or(DeviceError::DeviceNotFound)?;

        if !device.active {
            return Err(DeviceError::DeviceInactive.into());
        }
        if self.sites.find_by_id(site_id).await?.is_none() {
            return Err(DeviceError::SiteNotFound.into());
        }

        let mut tx = self.storage.get_pool().begin().await?;
        self.assignments.close_open(device_id, now, &mut tx).await?;
        self.assignments
            .create(
                &DeviceAssignment {
                    id: 0,
                    device_id,
                    site_id,
                    program_id,
                    assigned_at: now,
                    unassigned_at: None,
                },
                &mut tx,
            )
            .await?;
        self.devices
            .update_assignment(device_id, Some(site_id), program_id, &mut tx)
            .await?;
        self.devices
            .update_wake_times(
                device_id,
                device.last_wake_at,
                Some(now + Duration::minutes(device.wake_interval_minutes as i64)),
                &mut tx,
            )
            .await?;
        tx.commit().await?;

        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| DeviceError::DeviceNotFound.into())
    }

    pub async fn unassign_device(
        &self,
        device_id: i32,
        now: OffsetDateTime,
    ) -> Result<Device, ApiError> {
        let device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or(DeviceError::DeviceNotFound)?;

        let mut tx = self.storage.get_pool().begin().await?;
        self.assignments.close_open(device_id, now, &mut tx).await?;
        self.devices
            .update_assignment(device_id, None, None, &mut tx)
            .await?;
        // No site means no expected wakes to sweep.
        self.devices
            .update_wake_times(device_id, device.last_wake_at, None, &mut tx)
            .await?;
        tx.commit().await?;

        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| DeviceError::DeviceNotFound.into())
    }

    pub async fn deactivate_device(&self, device_id: i32) -> Result<Device, ApiError> {
        let device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or(DeviceError::DeviceNotFound)?;

        let mut tx = self.storage.get_pool().begin().await?;
        self.devices.set_active(device_id, false, &mut tx).await?;
        self.devices
            .update_wake_times(device_id, device.last_wake_at, None, &mut tx)
            .await?;
        tx.commit().await?;

        self.devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| DeviceError::DeviceNotFound.into())
    }

    /// Cross-checks the device row against the ledger. Drift here is a data
    /// integrity fault, not a recoverable condition.
    pub async fn verify_assignment(&self, device_id: i32) -> Result<(), ApiError> {
        let device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or(DeviceError::DeviceNotFound)?;

        let open = self.assignments.find_open_by_device_id(device_id).await?;
        let ledger_site = open.map(|a| a.site_id);

        if device.site_id != ledger_site {
            return Err(DeviceError::AssignmentDrift {
                direct: device.site_id,
                ledger: ledger_site,
            }
            .into());
        }

        Ok(())
    }

    pub async fn assignment_history(
        &self,
        device_id: i32,
    ) -> Result<Vec<DeviceAssignment>, ApiError> {
        if self.devices.find_by_id(device_id).await?.is_none() {
            return Err(DeviceError::DeviceNotFound.into());
        }

        Ok(self.assignments.find_by_device_id(device_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac_strips_separators() {
        assert_eq!(normalize_mac("b8:f8:62:f9:cf:b8").unwrap(), "B8F862F9CFB8");
        assert_eq!(normalize_mac("B8-F8-62-F9-CF-B8").unwrap(), "B8F862F9CFB8");
        assert_eq!(normalize_mac("b8f862f9cfb8").unwrap(), "B8F862F9CFB8");
    }

    #[test]
    fn test_normalize_mac_rejects_garbage() {
        assert!(normalize_mac("not-a-mac").is_err());
        assert!(normalize_mac("B8F862F9CF").is_err());
        assert!(normalize_mac("B8F862F9CFB8FF").is_err());
        assert!(normalize_mac("G8F862F9CFB8").is_err());
    }
}
