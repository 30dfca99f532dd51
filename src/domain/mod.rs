pub mod accounting;
pub mod sanitize;
pub mod sensor;
pub mod smoothing;
pub mod status;
pub mod timer;

pub use accounting::AccountingState;
pub use sensor::{RawSample, SampleSource};
pub use smoothing::SmoothingWindow;
pub use status::StatusReport;
pub use timer::ElapsedTimer;
