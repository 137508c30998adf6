pub mod cancel;
pub mod lock;
pub mod platform;
pub mod queue;
pub mod summary;

pub use cancel::{CancelProbe, NeverCanceled};
pub use lock::LockStore;
pub use platform::{PlatformAccount, PlatformClient, PlatformMessage, PlatformRoom};
pub use queue::{JobEnvelope, JobQueue, QueuedDelivery};
pub use summary::{SummaryModel, SummaryOutput, SummaryRequest};
