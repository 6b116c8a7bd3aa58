//! Platform bindings
//!
//! Everything that talks to the OS lives here. The rest of the crate only
//! sees the `Interceptor`, `InputSourceFeed` and `OverlaySurface` traits.

#[cfg(target_os = "macos")]
mod macos;

use anyhow::Result;

use crate::config::Config;

/// Run the application until it is shut down. Takes over the calling
/// thread, which must be the process's main thread.
pub fn run(config: Config) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        macos::run(config)
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        anyhow::bail!("keyhud only runs on macOS")
    }
}
