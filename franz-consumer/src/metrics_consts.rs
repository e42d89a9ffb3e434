pub const MESSAGES_RECEIVED: &str = "franz_messages_received_total";
pub const MESSAGES_COMMITTED: &str = "franz_messages_committed_total";
pub const DISPATCH_ERRORS: &str = "franz_dispatch_errors_total";
pub const TRANSPORT_ERRORS: &str = "franz_transport_errors_total";
pub const DEAD_LETTERED: &str = "franz_dead_lettered_total";
pub const PROCESSING_TIME: &str = "franz_message_processing_seconds";
pub const FAILED_OFFSETS_HELD: &str = "franz_failed_offsets_held";
