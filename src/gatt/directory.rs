use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

/// A peripheral seen in the scan feed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Peripheral {
    address: String,
    name: Option<String>,
    rssi: Option<i16>,
}

impl Peripheral {
    /// Creates a peripheral record.
    #[must_use]
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
        }
    }

    /// Returns the stable hardware address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the advertised name, if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the last observed RSSI in dBm, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }
}

type NamePredicate = dyn Fn(&str) -> bool + Send + Sync;

/// Admission rule for advertisements entering the directory.
#[derive(Clone)]
pub enum DeviceFilter {
    /// Admit names containing this substring.
    NameContains(String),
    /// Admit names the predicate accepts.
    Predicate(Arc<NamePredicate>),
}

impl DeviceFilter {
    /// Creates a substring filter.
    #[must_use]
    pub fn name_contains(fragment: impl Into<String>) -> Self {
        Self::NameContains(fragment.into())
    }

    /// Creates a filter from an arbitrary name predicate.
    ///
    /// ```
    /// let filter = blesched::DeviceFilter::predicate(|name| name.starts_with("HRM"));
    /// assert!(filter.admits(Some("HRM-Pro")));
    /// assert!(!filter.admits(Some("Thermo")));
    /// assert!(!filter.admits(None));
    /// ```
    #[must_use]
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Returns whether an advertised name passes the filter. Unnamed
    /// advertisements never pass.
    #[must_use]
    pub fn admits(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return false;
        };
        match self {
            Self::NameContains(fragment) => name.contains(fragment.as_str()),
            Self::Predicate(predicate) => predicate(name),
        }
    }
}

impl fmt::Debug for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameContains(fragment) => f.debug_tuple("NameContains").field(fragment).finish(),
            Self::Predicate(_predicate) => f.write_str("Predicate(..)"),
        }
    }
}

/// Result of feeding one advertisement into the directory.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Observation {
    /// First sighting of this address.
    Discovered(Peripheral),
    /// A known peripheral reported a different signal strength.
    RssiChanged(Peripheral),
    /// A known peripheral with nothing new to report.
    Unchanged,
    /// The filter rejected the advertisement.
    Filtered,
}

/// De-duplicated, insertion-ordered table of discovered peripherals.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    peripherals: Vec<Peripheral>,
    index_by_address: HashMap<String, usize>,
    filter: Option<DeviceFilter>,
}

impl DeviceDirectory {
    #[must_use]
    pub fn new(filter: Option<DeviceFilter>) -> Self {
        Self {
            peripherals: Vec::new(),
            index_by_address: HashMap::new(),
            filter,
        }
    }

    /// Upserts a peripheral from an advertisement.
    pub fn observe(&mut self, address: &str, name: Option<&str>, rssi: Option<i16>) -> Observation {
        let key = address_key(address);
        if let Some(&index) = self.index_by_address.get(&key) {
            let known = &mut self.peripherals[index];
            if known.name.is_none()
                && let Some(name) = name
            {
                known.name = Some(name.to_string());
            }
            return match rssi {
                Some(rssi) if known.rssi != Some(rssi) => {
                    known.rssi = Some(rssi);
                    Observation::RssiChanged(known.clone())
                }
                _ => Observation::Unchanged,
            };
        }

        if let Some(filter) = &self.filter
            && !filter.admits(name)
        {
            trace!(address, ?name, "advertisement rejected by device filter");
            return Observation::Filtered;
        }

        let peripheral = Peripheral::new(address, name.map(str::to_string), rssi);
        self.index_by_address.insert(key, self.peripherals.len());
        self.peripherals.push(peripheral.clone());
        Observation::Discovered(peripheral)
    }

    pub fn clear(&mut self) {
        self.peripherals.clear();
        self.index_by_address.clear();
    }

    /// Returns the peripherals in discovery order.
    #[must_use]
    pub fn list(&self) -> Vec<Peripheral> {
        self.peripherals.clone()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Peripheral> {
        self.peripherals.get(index)
    }

    /// Finds a peripheral by address, ignoring ASCII case.
    #[must_use]
    pub fn find(&self, address: &str) -> Option<&Peripheral> {
        self.index_by_address
            .get(&address_key(address))
            .and_then(|&index| self.peripherals.get(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }
}

fn address_key(address: &str) -> String {
    address.to_ascii_uppercase()
}
