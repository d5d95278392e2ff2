use crate::error::{AppError, Result};

/// Protocol prefix shared by every P1 meter signature.
pub const SIGNATURE_PREFIX: &str = "2019-ETI-EMON-V01";

/// Full store signature of a meter: `<prefix>-<meter id as 6 hex digits>-<manufacturer mac>`.
pub fn full_signature(meter_id: u32, manufacturer_mac: &str) -> String {
    format!("{}-{:06X}-{}", SIGNATURE_PREFIX, meter_id, manufacturer_mac)
}

/// Ordered manufacturer identifiers tried for a meter until one returns data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    manufacturer_macs: Vec<String>,
}

impl CandidateSet {
    pub fn new(manufacturer_macs: Vec<String>) -> Result<Self> {
        if manufacturer_macs.is_empty() {
            return Err(AppError::Config(
                "at least one manufacturer candidate is required".to_string(),
            ));
        }
        Ok(Self { manufacturer_macs })
    }

    pub fn len(&self) -> usize {
        self.manufacturer_macs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manufacturer_macs.is_empty()
    }

    /// Candidate signatures for `meter_id`, in trial order.
    pub fn signatures(&self, meter_id: u32) -> impl Iterator<Item = String> + '_ {
        self.manufacturer_macs
            .iter()
            .map(move |mac| full_signature(meter_id, mac))
    }
}
