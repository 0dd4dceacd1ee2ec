mod health;
mod verify;

pub use health::{health_check, readiness_check};
pub use verify::verify_issue;
