pub mod alert;
pub mod events;
pub mod quote;

pub use alert::{Alert, AlertKind};
pub use events::{AlertEvent, Lifecycle, LifecycleEvent, MonitorEvent, PriceUpdate};
pub use quote::PriceQuote;
