//! BLE Advertising
//!
//! Builds the legacy advertising and scan response payloads once at startup
//! and submits them to the stack. Nothing here reacts to connections:
//! re-arming advertising after a central drops is an explicit call to
//! [`Advertiser::start`] by the application.

use heapless::Vec;

use crate::ble::stack::{RadioStack, StackError};
use crate::config;

/// Maximum advertising data length (BLE specification)
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Smallest connectable advertising interval, in 0.625 ms units (20 ms)
pub const MIN_ADV_INTERVAL: u32 = 32;

/// Largest legacy advertising interval, in 0.625 ms units (10.24 s)
pub const MAX_ADV_INTERVAL: u32 = 0x4000;

/// AD type codes used by this peripheral
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const COMPLETE_16BIT_SERVICE_UUIDS: u8 = 0x03;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;
}

/// Legacy advertising payload (at most 31 bytes)
pub type AdvertisingPayload = Vec<u8, MAX_ADV_DATA_LEN>;

/// Advertising errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingError {
    /// The AD structures do not fit the 31-byte legacy PDU
    TooLong,
    /// The stack refused to start advertising
    Stack(StackError),
}

impl From<StackError> for AdvertisingError {
    fn from(e: StackError) -> Self {
        AdvertisingError::Stack(e)
    }
}

/// Appends AD structures (`len, type, data...`) to a legacy payload
#[derive(Debug, Default)]
pub struct AdvertisingDataBuilder {
    data: AdvertisingPayload,
    overflow: bool,
}

impl AdvertisingDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(self, flags: u8) -> Self {
        self.raw(ad_type::FLAGS, &[], &[flags])
    }

    /// Complete list of 16-bit service UUIDs
    pub fn services_16(mut self, uuids: &[u16]) -> Self {
        let mut encoded: Vec<u8, MAX_ADV_DATA_LEN> = Vec::new();
        for uuid in uuids {
            if encoded.extend_from_slice(&uuid.to_le_bytes()).is_err() {
                self.overflow = true;
                return self;
            }
        }
        self.raw(ad_type::COMPLETE_16BIT_SERVICE_UUIDS, &[], &encoded)
    }

    /// Manufacturer-specific data, prefixed with the company identifier
    pub fn manufacturer_data(self, company_id: u16, data: &[u8]) -> Self {
        self.raw(ad_type::MANUFACTURER_SPECIFIC_DATA, &company_id.to_le_bytes(), data)
    }

    pub fn full_name(self, name: &str) -> Self {
        self.raw(ad_type::COMPLETE_LOCAL_NAME, &[], name.as_bytes())
    }

    /// Append one AD structure whose data is `head` followed by `tail`
    pub fn raw(mut self, ad_type: u8, head: &[u8], tail: &[u8]) -> Self {
        if self.overflow {
            return self;
        }

        // Length byte counts the type byte plus the data
        let len = 1 + head.len() + tail.len();
        if self.data.len() + 1 + len > MAX_ADV_DATA_LEN {
            self.overflow = true;
            return self;
        }

        // Capacity was checked above, none of these can fail
        let _ = self.data.push(len as u8);
        let _ = self.data.push(ad_type);
        let _ = self.data.extend_from_slice(head);
        let _ = self.data.extend_from_slice(tail);
        self
    }

    pub fn build(self) -> Result<AdvertisingPayload, AdvertisingError> {
        if self.overflow {
            return Err(AdvertisingError::TooLong);
        }
        Ok(self.data)
    }
}

/// The fixed advertising payload: flags, service UUID list and
/// manufacturer-specific data.
pub fn advertising_payload() -> Result<AdvertisingPayload, AdvertisingError> {
    AdvertisingDataBuilder::new()
        .flags(config::ADV_FLAGS)
        .services_16(&[config::ADV_SERVICE_UUID16])
        .manufacturer_data(config::COMPANY_ID, &config::MANUFACTURER_DATA)
        .build()
}

/// The fixed scan response: complete local name.
pub fn scan_response_payload() -> Result<AdvertisingPayload, AdvertisingError> {
    AdvertisingDataBuilder::new().full_name(config::DEVICE_NAME).build()
}

/// Convert a microsecond interval to 0.625 ms radio units, rounding up and
/// clamping to the legal range.
pub fn interval_units(interval_us: u32) -> u32 {
    interval_us.div_ceil(625).clamp(MIN_ADV_INTERVAL, MAX_ADV_INTERVAL)
}

/// Holds the advertising payloads built at startup
#[derive(Debug)]
pub struct Advertiser {
    adv_data: AdvertisingPayload,
    scan_data: AdvertisingPayload,
    interval_us: u32,
}

impl Advertiser {
    /// Build both payloads from the compiled-in configuration
    pub fn new() -> Result<Self, AdvertisingError> {
        let adv_data = advertising_payload()?;
        let scan_data = scan_response_payload()?;

        debug!(
            "ADV: Payload {} bytes, scan response {} bytes",
            adv_data.len(),
            scan_data.len()
        );

        Ok(Self {
            adv_data,
            scan_data,
            interval_us: config::ADV_INTERVAL_US,
        })
    }

    pub fn adv_data(&self) -> &[u8] {
        &self.adv_data
    }

    pub fn scan_data(&self) -> &[u8] {
        &self.scan_data
    }

    /// Submit the payloads to the stack and start advertising
    pub fn start<S: RadioStack>(&self, stack: &mut S) -> Result<(), AdvertisingError> {
        stack.advertise(self.interval_us, &self.adv_data, &self.scan_data)?;
        info!("ADV: Advertising every {} us", self.interval_us);
        Ok(())
    }
}
