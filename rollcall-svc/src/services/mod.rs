//! Service layer: geofencing, recognition, notifications, and the session
//! orchestrator that ties them to the store

pub mod geofence_validator;
pub mod notification_dispatcher;
pub mod ownership;
pub mod recognition_client;
pub mod session_locks;
pub mod session_orchestrator;

pub use geofence_validator::{check_zones, haversine_distance, GeofenceValidator};
pub use notification_dispatcher::{NotificationDispatcher, NotificationOutcome};
pub use recognition_client::{
    RecognitionClient, RecognitionError, RecognitionHealth, RecognitionRequest, RecognitionResult,
    Recognizer, StudentOutcome,
};
pub use session_locks::SessionLocks;
pub use session_orchestrator::{
    reconcile, CreateSessionRequest, CreatedSession, NotificationSummary, RecordUpdate,
    SessionDetail, SessionOrchestrator, SessionPage,
};
