use ndarray::{s, Array1};

use super::chunk::{ChunkProvider, DataChunk, DetectorSources};
use super::config::Config;
use super::cxi_writer::CxiWriter;
use super::error::{AssemblerError, PulseIdError};
use super::frame_index::FrameIndex;
use super::layout::build_layouts;
use super::mapper::ChunkMapper;
use super::pulse_ids::PulseIdCollector;
use super::run_source::RunDirectory;

const PULSE_ID_KEY: &str = "image.pulseId";

/// Read one chunk's pulse id values. In some files there's an extra
/// dimension of length 1.
fn read_pulse_values(chunk: &DataChunk) -> Result<Vec<u64>, hdf5::Error> {
    let row = chunk.first as usize;
    let n_rows = chunk.total_frames() as usize;
    let values: Array1<u64> = if chunk.dataset.ndim() > 1 {
        chunk.dataset.read_slice(s![row..row + n_rows, 0])?
    } else {
        chunk.dataset.read_slice(s![row..row + n_rows])?
    };
    Ok(values.to_vec())
}

/// Fill the pulse id table from every module stream and validate coverage
/// and cross-module agreement.
fn collect_pulse_ids(
    index: &FrameIndex,
    detector: &DetectorSources,
    run: &RunDirectory,
) -> Result<Array1<u64>, AssemblerError> {
    let mapper = ChunkMapper::new(index);
    let mut collector = PulseIdCollector::new(index.total_frames(), detector.n_modules());

    for (module_ix, source) in detector.module_to_source.values().enumerate() {
        for chunk in run.find_chunks(source, PULSE_ID_KEY)? {
            let values = read_pulse_values(&chunk)?;
            collector
                .record_chunk(
                    &mapper,
                    &chunk.train_ids,
                    &chunk.counts,
                    chunk.first,
                    &values,
                    module_ix,
                    source,
                )
                .map_err(PulseIdError::from)?;
        }
    }

    Ok(collector.validate()?)
}

/// The main entry point of the assembler.
///
/// One-shot batch transform: reconcile every module stream of the run
/// against the global frame index and write the assembled CXI file. On any
/// error the (possibly partially written) output must be discarded and the
/// whole run re-invoked; there is no partial-success mode.
pub fn assemble_run(config: &Config) -> Result<(), AssemblerError> {
    let run = RunDirectory::open(&config.run_path)?;
    let detector = run.detector_sources()?;

    let index = FrameIndex::new(&detector.train_ids, detector.frames_per_train)?;
    spdlog::info!(
        "{} frames per train, {} frames in total",
        index.frames_per_train(),
        index.total_frames()
    );
    let (y, x) = detector.module_shape;
    spdlog::info!(
        "Assembled data shape: ({}, {}, {}, {})",
        index.total_frames(),
        detector.n_modules(),
        y,
        x
    );

    let pulse_ids = collect_pulse_ids(&index, &detector, &run)?;
    let layouts = build_layouts(&index, &detector, &run)?;

    spdlog::info!("Writing to {}", config.output_path.to_string_lossy());
    let writer = CxiWriter::new(&config.output_path)?;
    writer.write_frame_ids(index.per_frame_train_ids(), &pulse_ids)?;
    for layout in layouts.iter() {
        writer.write_layout(layout)?;
    }
    writer.write_module_numbers(&detector.module_numbers())?;

    spdlog::info!("Finished writing assembled CXI file");
    Ok(())
}
