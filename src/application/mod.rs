//! Application layer: the tariff and blog workflows and their ports

pub mod blogs;
pub mod notifications;
pub mod ports;
pub mod relay;
pub mod tariffs;

pub use blogs::{BlogService, Caller, StatusChange};
pub use notifications::{DispatchMode, DispatcherOptions, NotificationDispatcher};
pub use ports::{CacheError, ChannelError, EventChannel, TariffCache};
pub use relay::{relay_record, RelayRecord};
pub use tariffs::{BatchPayload, CostQuote, TariffService};
