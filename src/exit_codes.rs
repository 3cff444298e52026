use serde::Serialize;

/// Aggregate result handed back to the calling installer framework.
pub const AGGREGATE_SUCCESS: i32 = 0;
pub const AGGREGATE_FAILURE: i32 = -1;

/// PnPUtil exit codes that count as a successful driver install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverInstallStatus {
    Success,
    /// ERROR_SUCCESS_REBOOT_REQUIRED
    SuccessRebootRequired,
    /// ERROR_SUCCESS_REBOOT_INITIATED
    SuccessRebootInitiated,
}

impl DriverInstallStatus {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            3010 => Some(Self::SuccessRebootRequired),
            1641 => Some(Self::SuccessRebootInitiated),
            _ => None,
        }
    }

    pub fn reboot_required(self) -> bool {
        matches!(self, Self::SuccessRebootRequired)
    }
}

/// Collapses the driver-install exit code to 0 or -1.
pub fn aggregate_result(driver_exit_code: i32) -> i32 {
    match DriverInstallStatus::from_exit_code(driver_exit_code) {
        Some(_) => AGGREGATE_SUCCESS,
        None => AGGREGATE_FAILURE,
    }
}
