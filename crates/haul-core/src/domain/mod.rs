//! Domain model (IDs, records, status table, delivery check, errors).
//!
//! このモジュールは I/O を持ちません。遷移表（state）と投入判定（delivery）は
//! 純粋関数で、Engine からも CLI からも同じものを参照します。

pub mod container;
pub mod delivery;
pub mod errors;
pub mod events;
pub mod ids;
pub mod scan;
pub mod state;
pub mod task;
pub mod user;

pub use self::container::{
    ContainerRef, Coordinates, CustomerContainer, MaterialType, WarehouseContainer,
};
pub use self::delivery::{DeliveryRejection, validate_delivery};
pub use self::errors::{EngineError, EntityKind, ErrorKind, StoreError};
pub use self::events::{ActivityKind, ActivityLogEntry};
pub use self::ids::{
    ActivityId, CustomerContainerId, FillEntryId, IdParseError, ScanEventId, TaskId, UserId,
    WarehouseContainerId,
};
pub use self::scan::{FillEntry, ScanContext, ScanEvent, ScanResult};
pub use self::state::{InvalidTransition, TaskStatus, is_valid_transition};
pub use self::task::{NewTask, Priority, StatusTimestamps, Task};
pub use self::user::{Role, User};
