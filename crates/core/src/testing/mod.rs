//! Testing utilities and mock implementations.
//!
//! [`MockEngine`] stands in for a real conversion backend so the router and
//! the orchestrator can be exercised without ffmpeg, LibreOffice or a
//! document server installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use multiconvert_core::testing::{MockBehavior, MockEngine};
//!
//! let primary = MockEngine::new("primary", &["docx"], &["pdf"])
//!     .with_behavior(MockBehavior::Fail("no fonts".into()));
//! let backup = MockEngine::new("backup", &["docx"], &["pdf"]);
//!
//! // Build a router over both...
//! ```

mod mock_engine;

pub use mock_engine::{MockBehavior, MockEngine};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io;
    use std::path::{Path, PathBuf};

    /// Writes a small input file named `name` into `dir`.
    pub fn input_file(dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, format!("fixture {}", name))?;
        Ok(path)
    }
}
