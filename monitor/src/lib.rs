pub mod factory;
pub mod logging;
pub mod service;

pub use factory::build_monitor;
pub use logging::MonitorEventLogger;
pub use service::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RECOVERY_DELAY, Monitor, MonitorSettings, MonitorState,
    MonitorStats, MonitorStatus, RunStats,
};
