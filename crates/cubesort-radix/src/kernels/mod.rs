mod downsweep;
mod spine;
mod upsweep;

pub(crate) use downsweep::*;
pub(crate) use spine::*;
pub(crate) use upsweep::*;
