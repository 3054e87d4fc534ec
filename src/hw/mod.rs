mod btleplug_link;
mod fake_link;
mod link;
mod model;

pub use self::btleplug_link::{BtleplugBackend, BtleplugLink};
pub use self::fake_link::{
    BATTERY_LEVEL, BATTERY_SERVICE, DEVICE_INFORMATION_SERVICE, FIXTURE_SERVICE, FakeBackend,
    FakeDevice, FakeLink, FakeLinkScript, LinkCall, MODEL_NUMBER, NotificationFixture,
    ScanFixture, UART_RX, UART_SERVICE, UART_TX, ValueFixture, default_services,
};
pub use self::link::{
    AdapterStatus, HardwareLink, LinkBackend, LinkEventReceiver, LinkEventSender, NotifySetup,
    WriteMode,
};
pub use self::model::{CharacteristicInfo, ServiceInfo, find_characteristic};
