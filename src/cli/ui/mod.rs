mod device_view;
mod painter;
mod table;
mod value_view;

pub(crate) use self::device_view::DeviceListView;
pub(crate) use self::painter::Painter;
pub(crate) use self::value_view::{
    NotificationView, ReadView, SubscriptionSummaryView, WriteView,
};
