use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::partial::PartialPath;
use crate::domain::ProvisionError;

/// Copy a regular file into a destination that must not exist yet, using a
/// read/write loop with a buffer of `buffer_size` bytes. A failed copy removes
/// the destination it created, including when the copy is cancelled.
pub async fn copy_regular_file(
    src: &Path,
    dst: &Path,
    buffer_size: usize,
) -> Result<u64, ProvisionError> {
    let metadata = fs::metadata(src)
        .await
        .map_err(|e| ProvisionError::storage(src, e))?;

    if !metadata.is_file() {
        return Err(ProvisionError::not_regular_file(src));
    }

    let mut source = fs::File::open(src)
        .await
        .map_err(|e| ProvisionError::storage(src, e))?;

    let mut destination = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ProvisionError::already_exists(dst),
            _ => ProvisionError::storage(dst, e),
        })?;

    let partial = PartialPath::new(dst);

    match pump(&mut source, &mut destination, buffer_size.max(1)).await {
        Ok(copied) => {
            partial.keep();
            Ok(copied)
        }
        Err(e) => {
            drop(destination);
            partial.discard().await;
            Err(ProvisionError::storage(dst, e))
        }
    }
}

async fn pump(
    source: &mut fs::File,
    destination: &mut fs::File,
    buffer_size: usize,
) -> std::io::Result<u64> {
    let mut buffer = vec![0u8; buffer_size];
    let mut copied = 0u64;

    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        destination.write_all(&buffer[..read]).await?;
        copied += read as u64;
    }

    destination.flush().await?;
    Ok(copied)
}
