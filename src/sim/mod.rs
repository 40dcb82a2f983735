/// Post-hoc MD, savings, clipping and ROI analysis.
pub mod analysis;
/// Clock-hour windows and sample cadence.
pub mod clock;
pub mod controller;
pub mod engine;
/// Structured simulation events.
pub mod event;
pub mod power_balance;
pub mod recommendation;
pub mod time_of_control;
pub mod time_of_use;
pub mod types;
pub mod window;
