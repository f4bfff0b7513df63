use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::Array1;

use super::chunk::{ChunkProvider, DataChunk, DetectorSources};
use super::error::RunSourceError;

/// One detector module source found in one run file.
#[derive(Debug)]
struct ModuleFile {
    file: hdf5::File,
    source: String,
    module_no: u64,
    /// INDEX/trainId of the file, in recording order
    train_ids: Vec<u64>,
}

/// A directory of EuXFEL-style run files, indexed by detector source.
///
/// Each file carries INDEX/trainId plus, per source, the row offset and frame
/// count of every train (INDEX/<source>/image/{first,count}) and the stored
/// values themselves (INSTRUMENT/<source>/image/<name>). Chunks are derived
/// from the index alone; no payload is read here.
#[derive(Debug)]
pub struct RunDirectory {
    path: PathBuf,
    files: Vec<ModuleFile>,
}

/// Pull the module number out of a source name like
/// "SPB_DET_AGIPD1M-1/DET/11CH0:xtdf".
fn parse_module_number(channel: &str, source: &str) -> Result<u64, RunSourceError> {
    let digits: String = channel.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| RunSourceError::BadSourceName(source.to_string()))
}

impl RunDirectory {
    /// Open every .h5 file in the directory and record which detector module
    /// sources each one carries.
    pub fn open(path: &Path) -> Result<Self, RunSourceError> {
        if !path.exists() {
            return Err(RunSourceError::BadRunPath(path.to_path_buf()));
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "h5"))
            .collect();
        entries.sort();

        let mut files = Vec::new();
        for entry in entries.iter() {
            let file = hdf5::File::open(entry)?;

            // Non-detector files in the directory are skipped
            let Ok(instrument) = file.group("INSTRUMENT") else {
                continue;
            };
            let train_ids: Vec<u64> = file.dataset("INDEX/trainId")?.read_1d()?.to_vec();
            for topic in instrument.member_names()? {
                let Ok(det) = instrument.group(&format!("{topic}/DET")) else {
                    continue;
                };
                for channel in det.member_names()? {
                    let source = format!("{topic}/DET/{channel}");
                    let module_no = parse_module_number(&channel, &source)?;
                    files.push(ModuleFile {
                        file: file.clone(),
                        source,
                        module_no,
                        train_ids: train_ids.clone(),
                    });
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            files,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Summarize the detector for this run: module map, merged train ids,
    /// frames per train and the per-module image shape.
    pub fn detector_sources(&self) -> Result<DetectorSources, RunSourceError> {
        if self.files.is_empty() {
            return Err(RunSourceError::NoModuleSources);
        }

        let mut module_to_source = BTreeMap::new();
        let mut train_ids = Vec::new();
        let mut frames_per_train = 0;
        for module_file in self.files.iter() {
            module_to_source.insert(module_file.module_no, module_file.source.clone());
            train_ids.extend_from_slice(&module_file.train_ids);

            let counts: Array1<u64> = module_file
                .file
                .dataset(&format!("INDEX/{}/image/count", module_file.source))?
                .read_1d()?;
            frames_per_train = frames_per_train.max(counts.iter().copied().max().unwrap_or(0));
        }
        train_ids.sort_unstable();
        train_ids.dedup();

        // Module geometry comes from the first module's data dataset
        let first = &self.files[0];
        let data = first
            .file
            .dataset(&format!("INSTRUMENT/{}/image/data", first.source))?;
        let shape = data.shape();
        if shape.len() != 3 {
            return Err(RunSourceError::BadDataShape(first.source.clone()));
        }

        Ok(DetectorSources {
            module_to_source,
            train_ids,
            frames_per_train: frames_per_train as usize,
            module_shape: (shape[1], shape[2]),
        })
    }
}

impl ChunkProvider for RunDirectory {
    /// Split one source's index into maximal contiguous chunks: a chunk ends
    /// wherever the stored rows stop being consecutive. Trains with zero
    /// recorded frames are skipped.
    fn find_chunks(&self, source: &str, key: &str) -> Result<Vec<DataChunk>, RunSourceError> {
        let mut chunks = Vec::new();

        for module_file in self.files.iter().filter(|f| f.source == source) {
            let firsts: Array1<u64> = module_file
                .file
                .dataset(&format!("INDEX/{source}/image/first"))?
                .read_1d()?;
            let counts: Array1<u64> = module_file
                .file
                .dataset(&format!("INDEX/{source}/image/count"))?
                .read_1d()?;
            if firsts.len() != counts.len() || firsts.len() != module_file.train_ids.len() {
                return Err(RunSourceError::MalformedIndex(source.to_string()));
            }

            let dataset = module_file
                .file
                .dataset(&format!("INSTRUMENT/{source}/{}", key.replace('.', "/")))?;

            let mut current: Option<DataChunk> = None;
            let mut end = 0;
            for ((&first, &count), &train_id) in firsts
                .iter()
                .zip(counts.iter())
                .zip(module_file.train_ids.iter())
            {
                if count == 0 {
                    continue;
                }
                match current {
                    Some(ref mut chunk) if first == end => {
                        chunk.train_ids.push(train_id);
                        chunk.counts.push(count);
                    }
                    _ => {
                        if let Some(chunk) = current.take() {
                            chunks.push(chunk);
                        }
                        current = Some(DataChunk {
                            source: source.to_string(),
                            dataset: dataset.clone(),
                            train_ids: vec![train_id],
                            counts: vec![count],
                            first,
                        });
                        end = first;
                    }
                }
                end += count;
            }
            if let Some(chunk) = current.take() {
                chunks.push(chunk);
            }
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_number() {
        assert_eq!(parse_module_number("11CH0:xtdf", "src").unwrap(), 11);
        assert_eq!(parse_module_number("0CH0:xtdf", "src").unwrap(), 0);
        assert!(matches!(
            parse_module_number("CH0:xtdf", "src"),
            Err(RunSourceError::BadSourceName(_))
        ));
    }
}
