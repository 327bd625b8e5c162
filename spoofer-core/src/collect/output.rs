use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{SpooferError, SpooferResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Routed,
    Private,
}

/// Values stamped into the comment header of both files.
#[derive(Debug, Clone)]
pub struct HeaderContext {
    pub collected_at: String,
    pub start_date: String,
}

/// Four comment lines followed by a blank separator line. Both files get
/// the same header.
pub fn file_header(context: &HeaderContext) -> String {
    format!(
        "# IPv4 clients that can spoof - Data from CAIDA Spoofer API\n\
         # Collection date: {}\n\
         # Data period: {} to present\n\
         # Format: Formatted text\n\n",
        context.collected_at,
        context.start_date,
    )
}

/// Create the parent directory of `path` when it has one and it is missing.
pub fn ensure_parent_dir(path: &Path) -> SpooferResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir).map_err(|e| SpooferError::OutputSetupFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn create_with_header(path: &Path, context: &HeaderContext) -> SpooferResult<BufWriter<File>> {
    ensure_parent_dir(path)?;

    let file = File::create(path).map_err(|e| SpooferError::OutputSetupFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    writer.write_all(file_header(context).as_bytes())?;
    Ok(writer)
}

/// The two append-only result files of one run.
///
/// Dropping without [`OutputFiles::finish`] still flushes on a best-effort
/// basis; `finish` reports flush errors.
pub struct OutputFiles {
    routed: BufWriter<File>,
    private: BufWriter<File>,
    routed_path: PathBuf,
    private_path: PathBuf,
}

impl OutputFiles {
    /// Create (truncating) both files and write their headers.
    pub fn create(
        routed_path: &Path,
        private_path: &Path,
        context: &HeaderContext,
    ) -> SpooferResult<Self> {
        let routed = create_with_header(routed_path, context)?;
        let private = create_with_header(private_path, context)?;

        Ok(Self {
            routed,
            private,
            routed_path: routed_path.to_path_buf(),
            private_path: private_path.to_path_buf(),
        })
    }

    pub fn append(&mut self, kind: OutputKind, line: &str) -> SpooferResult<()> {
        let writer = match kind {
            OutputKind::Routed => &mut self.routed,
            OutputKind::Private => &mut self.private,
        };
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    pub fn routed_path(&self) -> &Path {
        &self.routed_path
    }

    pub fn private_path(&self) -> &Path {
        &self.private_path
    }

    /// Flush and close both files.
    pub fn finish(mut self) -> SpooferResult<()> {
        let routed = self.routed.flush();
        let private = self.private.flush();
        routed?;
        private?;
        Ok(())
    }
}
