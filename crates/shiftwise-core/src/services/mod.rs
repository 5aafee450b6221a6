mod assistant_service;

pub use assistant_service::{AcceptOutcome, ApplyDecision, ApplyStatus, AssistantService};
