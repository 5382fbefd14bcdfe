//! Tiny prelude with the things virtually every module needs.

pub(crate) use anyhow::{Context as _, Result, bail};

#[allow(unused_imports)]
pub(crate) use tracing::{debug, error, info, trace, warn};
