//! Reading run templates and writing sweep summaries.

pub use adhocsim_utils::*;
