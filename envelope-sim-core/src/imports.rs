pub(crate) use anyhow::{anyhow, bail, Context};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use std::ffi::OsStr;
pub(crate) use std::fs::File;
pub(crate) use std::path::Path;

pub(crate) use crate::error::{AllowanceLocation, ConvergenceError, EnvelopeError, EnvelopeResult};
pub(crate) use crate::traits::*;
pub(crate) use crate::utils::{
    are_positions_equal, are_speeds_equal, POSITION_EPSILON, SPEED_EPSILON,
};
pub(crate) use crate::validate::*;
