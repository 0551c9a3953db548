use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};

const SOURCE_FILE_NAME: &str = "source";

/// Private working directory owned by a single invocation.
///
/// Removed on [`Scratch::release`], or on drop if the invocation bails out
/// early. Release failures are logged and swallowed so they can never replace
/// the invocation's real outcome.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = Builder::new();
        builder.prefix("derivatives-");

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        Ok(Scratch { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes the fetched source to a fixed name; the key's own file name may
    /// exceed what the local filesystem accepts.
    pub async fn store_source(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(SOURCE_FILE_NAME);
        tokio::fs::write(&path, bytes).await?;

        Ok(path)
    }

    /// Runs `write` against a fresh file and hands back its bytes. The file is
    /// gone by the time this returns, whether `write` succeeded or not.
    pub async fn render<F, E>(&self, write: F) -> Result<Vec<u8>, E>
    where
        F: FnOnce(&mut BufWriter<&std::fs::File>) -> Result<(), E>,
        E: From<io::Error>,
    {
        let file = NamedTempFile::new_in(self.dir.path())?;
        {
            let mut writer = BufWriter::new(file.as_file());
            write(&mut writer)?;
            writer.flush()?;
        }

        let bytes = tokio::fs::read(file.path()).await?;
        release_file(file);

        Ok(bytes)
    }

    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            tracing::warn!("failed to remove scratch dir {}: {}", path.display(), err);
        }
    }
}

fn release_file(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(err) = file.close() {
        tracing::warn!("failed to remove scratch file {}: {}", path.display(), err);
    }
}
