use serde::Serialize;
use uuid::Uuid;

/// A characteristic description discovered on a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CharacteristicInfo {
    uuid: Uuid,
    properties: Vec<String>,
    notify_descriptor: bool,
}

impl CharacteristicInfo {
    /// Creates a characteristic description.
    #[must_use]
    pub fn new(uuid: Uuid, properties: Vec<String>) -> Self {
        Self {
            uuid,
            properties,
            notify_descriptor: false,
        }
    }

    /// Marks whether the characteristic carries a client configuration descriptor.
    #[must_use]
    pub fn with_notify_descriptor(mut self, present: bool) -> Self {
        self.notify_descriptor = present;
        self
    }

    /// Returns the characteristic UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns property labels for this characteristic.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Returns whether enabling notifications requires a descriptor write.
    #[must_use]
    pub fn has_notify_descriptor(&self) -> bool {
        self.notify_descriptor
    }
}

/// A GATT service with discovered characteristics.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ServiceInfo {
    uuid: Uuid,
    primary: bool,
    characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Creates a service description.
    #[must_use]
    pub fn new(uuid: Uuid, primary: bool, characteristics: Vec<CharacteristicInfo>) -> Self {
        Self {
            uuid,
            primary,
            characteristics,
        }
    }

    /// Returns the service UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns whether this is a primary service.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns all characteristics in this service.
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }

    pub(crate) fn characteristics_mut(&mut self) -> &mut Vec<CharacteristicInfo> {
        &mut self.characteristics
    }
}

/// Looks up a characteristic in a service snapshot.
#[must_use]
pub fn find_characteristic<'a>(
    services: &'a [ServiceInfo],
    service: &Uuid,
    characteristic: &Uuid,
) -> Option<&'a CharacteristicInfo> {
    services
        .iter()
        .filter(|candidate| candidate.uuid == *service)
        .flat_map(ServiceInfo::characteristics)
        .find(|candidate| candidate.uuid == *characteristic)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot() -> Vec<ServiceInfo> {
        vec![
            ServiceInfo::new(
                Uuid::from_u128(1),
                true,
                vec![CharacteristicInfo::new(Uuid::from_u128(10), vec!["read".into()])],
            ),
            ServiceInfo::new(
                Uuid::from_u128(2),
                true,
                vec![
                    CharacteristicInfo::new(Uuid::from_u128(20), vec!["notify".into()])
                        .with_notify_descriptor(true),
                ],
            ),
        ]
    }

    #[test]
    fn finds_characteristic_within_its_own_service() {
        let services = snapshot();

        let found = find_characteristic(&services, &Uuid::from_u128(2), &Uuid::from_u128(20))
            .expect("characteristic should be found");
        assert!(found.has_notify_descriptor());
        assert_eq!(["notify".to_string()], found.properties());
    }

    #[test]
    fn characteristic_under_another_service_is_not_found() {
        let services = snapshot();

        assert_eq!(
            None,
            find_characteristic(&services, &Uuid::from_u128(1), &Uuid::from_u128(20))
        );
    }
}
