use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::info;

use super::AcquisitionError;

/// Decompresses `path` next to itself and removes the archive.
///
/// The output name is `path` without its last extension. Index archives are
/// concatenations of gzip members, so every member is decoded.
pub async fn gunzip_in_place(path: &Path) -> Result<PathBuf, AcquisitionError> {
    let input = path.to_path_buf();
    let output = input.with_extension("");
    info!("Decompressing file: {}", input.display());

    let result = {
        let input = input.clone();
        let output = output.clone();
        tokio::task::spawn_blocking(move || gunzip(&input, &output)).await?
    };

    result.map_err(|source| AcquisitionError::Decompress {
        path: input.clone(),
        source,
    })?;
    tokio::fs::remove_file(&input)
        .await
        .map_err(|source| AcquisitionError::Decompress {
            path: input.clone(),
            source,
        })?;
    Ok(output)
}

fn gunzip(input: &Path, output: &Path) -> io::Result<()> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(input)?));
    let mut writer = BufWriter::new(File::create(output)?);
    if let Err(e) = io::copy(&mut decoder, &mut writer) {
        drop(writer);
        let _ = std::fs::remove_file(output);
        return Err(e);
    }
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()
}
