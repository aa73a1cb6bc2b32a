//! Entity store: the single consistent view model the rest of the UI reads
//!
//! One slice per entity type (account, positions, orders, trades, market
//! status) with explicit loading/error flags, plus the display log. Push
//! updates arriving before an entity's first snapshot are buffered here.

pub mod slice;
pub mod store;

pub use slice::{EntitySlice, SliceView};
pub use store::DashboardStore;
