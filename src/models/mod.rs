//! Core data models for research requests, agent state and results.

mod effort;
mod research;

pub use effort::{
    get_effort_settings, Effort, EffortSettings, ParseEffortError, FLASH_MODEL, PRO_MODEL,
};
pub use research::{
    Citation, DeepSearchResult, Message, Reflection, ResearchState, Role, SearchQueryList,
    SourceSegment, NO_ANSWER,
};
