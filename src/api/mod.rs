//! HTTP API module for the payroll engine.
//!
//! This module exposes payroll creation, date generation, versioning,
//! consultant assignment and calendar adjustment over REST.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::{ACTOR_HEADER, create_router};
pub use request::{
    ActivateDueRequest, ActivateVersionsRequest, AdjustDateQuery, AssignConsultantRequest,
    CommitAssignmentsRequest, CreateVersionRequest, FallBackRequest, GenerateDatesRequest,
    SimpleVersionRequest, UpdateNotesRequest,
};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
