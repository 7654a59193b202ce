pub mod client;
pub mod error;
pub mod report;
pub mod schema;
pub mod session;
pub mod snapshot;

pub use client::{ChargingAction, ChargingOutcome, VehicleClient, VehicleConfig, VehicleSummary};
pub use error::{VehicleError, VehicleResult};
pub use report::ChargeReport;
pub use schema::{SchemaVersion, StatusView};
pub use session::ChargeSession;
