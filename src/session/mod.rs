pub mod bus;
pub mod gate;
pub mod idle;

pub use bus::{BusEvent, BusMessage, ChannelBus, SessionBus, StorageBus, SESSION_EVENT_KEY};
pub use gate::{SessionGate, SessionState};
pub use idle::{
    ActivitySignal, IdleMonitor, IdleTimeout, IdleTimeoutHandle, DEFAULT_CHECK_INTERVAL, DEFAULT_IDLE_TIMEOUT,
};
