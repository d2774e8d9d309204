//! Train physics simulation: path, rolling stock, integrator and curve generators.

pub mod context;
pub mod integrator;
pub mod overlays;
pub mod path;
pub mod rolling_stock;

pub use context::EnvelopeSimContext;
pub use integrator::{Action, IntegrationStep};
pub use path::EnvelopeSimPath;
pub use rolling_stock::{GammaType, RollingStock, TractiveEffortPoint};
