pub mod costs;
pub mod floor;

pub use costs::{aggregate_costs, AggregatedCosts, NO_TOOLS_SUMMARY};
pub use floor::{CostFloor, FloorBreach};
