use std::{
    path::PathBuf,
    time::Duration,
};

/// Fed to the tool's standard input to answer its confirmation prompt.
pub const CONFIRMATION: &[u8] = b"y";

/// Invokes the `wskdeploy` binary at `bin_path`.
#[derive(Clone, Debug)]
pub struct WskDeploy {
    pub(crate) bin_path: PathBuf,
    pub(crate) timeout: Option<Duration>,
}
