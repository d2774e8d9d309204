use super::{EnvelopeSimPath, RollingStock};
use crate::imports::*;

/// Everything the integrator needs to know about a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSimContext {
    pub rolling_stock: RollingStock,
    pub path: EnvelopeSimPath,
    /// Integration time step, s
    pub time_step: f64,
}

impl SerdeAPI for EnvelopeSimContext {
    fn init(&mut self) -> anyhow::Result<()> {
        self.rolling_stock.init()?;
        self.path.init()?;
        init_validated(self)
    }
}

impl ObjState for EnvelopeSimContext {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        validate_field(&mut errors, &self.rolling_stock, "Rolling stock");
        validate_field(&mut errors, &self.path, "Path");
        chk_num_gtz_fin(&mut errors, self.time_step, "Time step");
        errors.make_err()
    }
}

impl EnvelopeSimContext {
    pub fn new(rolling_stock: RollingStock, path: EnvelopeSimPath, time_step: f64) -> anyhow::Result<Self> {
        let context = Self {
            rolling_stock,
            path,
            time_step,
        };
        init_validated(&context)?;
        Ok(context)
    }

    /// The mock rolling stock on a flat path of the given length, with a 2 s time step
    pub fn mock(length: f64) -> anyhow::Result<Self> {
        Self::new(RollingStock::mock(), EnvelopeSimPath::flat(length)?, 2.)
    }
}
