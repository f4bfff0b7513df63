//! End-to-end checks against real HDF5 files: build a miniature two-module
//! run in a temp directory, assemble it, and re-read the output container.

use std::path::{Path, PathBuf};

use hdf5::types::VarLenUnicode;
use ndarray::{s, Array1, Array2, Array3};

use libcxi_assembler::config::Config;
use libcxi_assembler::cxi_writer::CxiWriter;
use libcxi_assembler::frame_index::FrameIndex;
use libcxi_assembler::layout::build_layouts;
use libcxi_assembler::process::assemble_run;
use libcxi_assembler::run_source::RunDirectory;

const Y: usize = 4;
const X: usize = 3;

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cxi_assembler_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn ensure_group(parent: &hdf5::Group, path: &str) -> hdf5::Group {
    let mut group = parent.clone();
    for part in path.split('/') {
        group = match group.group(part) {
            Ok(existing) => existing,
            Err(_) => group.create_group(part).unwrap(),
        };
    }
    group
}

/// Write one module's run file: the train index plus the stored image group.
/// Row r of the data carries the value `modno * 1000 + r`, pulse ids follow
/// the per-train offset pattern, and rows no train claims are filled with a
/// poison value so a bad mapping is visible.
fn write_module_file(
    path: &Path,
    modno: u64,
    train_ids: &[u64],
    counts: &[u64],
    firsts: &[u64],
    n_rows: usize,
) {
    let source = format!("FXE_DET_LPD1M-1/DET/{modno}CH0:xtdf");
    let file = hdf5::File::create(path).unwrap();

    let index_group = ensure_group(&file, &format!("INDEX/{source}/image"));
    file.group("INDEX")
        .unwrap()
        .new_dataset_builder()
        .with_data(train_ids)
        .create("trainId")
        .unwrap();
    index_group
        .new_dataset_builder()
        .with_data(firsts)
        .create("first")
        .unwrap();
    index_group
        .new_dataset_builder()
        .with_data(counts)
        .create("count")
        .unwrap();

    let mut data = Array3::<f32>::from_elem((n_rows, Y, X), -1.0);
    let mut gain = Array3::<f32>::from_elem((n_rows, Y, X), -1.0);
    let mut mask = Array3::<f32>::zeros((n_rows, Y, X));
    let mut pulse = Array1::<u64>::from_elem(n_rows, 7777);
    let mut cell = Array2::<u16>::from_elem((n_rows, 1), 7777);
    for (&count, &first) in counts.iter().zip(firsts.iter()) {
        for offset in 0..count {
            let row = (first + offset) as usize;
            data.slice_mut(s![row, .., ..])
                .fill(modno as f32 * 1000.0 + row as f32);
            gain.slice_mut(s![row, .., ..]).fill(row as f32);
            mask.slice_mut(s![row, .., ..]).fill(0.0);
            pulse[row] = offset;
            cell[[row, 0]] = offset as u16;
        }
    }

    let image_group = ensure_group(&file, &format!("INSTRUMENT/{source}/image"));
    image_group
        .new_dataset_builder()
        .with_data(&data)
        .create("data")
        .unwrap();
    image_group
        .new_dataset_builder()
        .with_data(&gain)
        .create("gain")
        .unwrap();
    image_group
        .new_dataset_builder()
        .with_data(&mask)
        .create("mask")
        .unwrap();
    if modno == 0 {
        // Flat pulse id layout for one module, (rows, 1) for the other, to
        // cover both stored shapes
        image_group
            .new_dataset_builder()
            .with_data(&pulse)
            .create("pulseId")
            .unwrap();
        let flat_cell: Array1<u16> = cell.column(0).to_owned();
        image_group
            .new_dataset_builder()
            .with_data(&flat_cell)
            .create("cellId")
            .unwrap();
    } else {
        let tall_pulse = pulse.insert_axis(ndarray::Axis(1));
        image_group
            .new_dataset_builder()
            .with_data(&tall_pulse)
            .create("pulseId")
            .unwrap();
        image_group
            .new_dataset_builder()
            .with_data(&cell)
            .create("cellId")
            .unwrap();
    }
}

#[test]
fn test_assemble_complete_run() {
    let dir = test_dir("complete");
    // Module 0 stores all six frames contiguously. Module 1 covers every
    // train too, but its storage has a two-row hole before train 102, so its
    // index splits into two chunks.
    write_module_file(
        &dir.join("RAW-R0001-LPD00-S00000.h5"),
        0,
        &[100, 101, 102],
        &[2, 2, 2],
        &[0, 2, 4],
        6,
    );
    write_module_file(
        &dir.join("RAW-R0001-LPD01-S00000.h5"),
        1,
        &[100, 101, 102],
        &[2, 2, 2],
        &[0, 2, 6],
        8,
    );
    // Run directories also hold aggregator files with no INSTRUMENT group
    // and no INDEX/trainId; those are skipped, not read. This one sorts
    // before the module files, so it is the first file opened.
    let stray = hdf5::File::create(dir.join("RAW-R0001-DA01-S00000.h5")).unwrap();
    ensure_group(&stray, "METADATA");
    drop(stray);

    let config = Config {
        run_path: dir.clone(),
        output_path: dir.join("out.cxi"),
    };
    assemble_run(&config).unwrap();

    let file = hdf5::File::open(dir.join("out.cxi")).unwrap();
    assert_eq!(
        file.dataset("format_version")
            .unwrap()
            .read_scalar::<i32>()
            .unwrap(),
        150
    );

    let train_ids = file
        .dataset("entry_1/trainId")
        .unwrap()
        .read_1d::<u64>()
        .unwrap();
    assert_eq!(train_ids.to_vec(), vec![100, 100, 101, 101, 102, 102]);
    let pulse_ids = file
        .dataset("entry_1/pulseId")
        .unwrap()
        .read_1d::<u64>()
        .unwrap();
    assert_eq!(pulse_ids.to_vec(), vec![0, 1, 0, 1, 0, 1]);

    let ids = file
        .dataset("entry_1/experiment_identifier")
        .unwrap()
        .read_1d::<VarLenUnicode>()
        .unwrap();
    assert_eq!(ids.len(), 6);
    assert_eq!(ids[0].as_str(), "100:0");
    assert_eq!(ids[3].as_str(), "101:1");
    assert_eq!(ids[5].as_str(), "102:1");
    // Splitting the composite id reproduces the raw arrays for every frame
    for (frame, id) in ids.iter().enumerate() {
        let (tid, pid) = id.as_str().split_once(':').unwrap();
        assert_eq!(tid.parse::<u64>().unwrap(), train_ids[frame]);
        assert_eq!(pid.parse::<u64>().unwrap(), pulse_ids[frame]);
    }

    let data = file
        .dataset("entry_1/instrument_1/detector_1/data")
        .unwrap();
    assert_eq!(data.shape(), vec![6, 2, Y, X]);
    assert_eq!(
        data.attr("axes")
            .unwrap()
            .read_scalar::<VarLenUnicode>()
            .unwrap()
            .as_str(),
        "experiment_identifier:module_identifier:y:x"
    );
    let data = data.read_dyn::<f32>().unwrap();
    for frame in 0..6 {
        // Module 0: storage row == frame
        assert_eq!(data[[frame, 0, 0, 0]], frame as f32);
        // Module 1: frames of train 102 sit after the storage hole
        let row = if frame < 4 { frame } else { frame + 2 };
        assert_eq!(data[[frame, 1, 1, 2]], 1000.0 + row as f32);
    }

    let cell = file.dataset("entry_1/cellId").unwrap();
    assert_eq!(
        cell.attr("axes")
            .unwrap()
            .read_scalar::<VarLenUnicode>()
            .unwrap()
            .as_str(),
        "experiment_identifier:module_identifier"
    );
    let cell = cell.read_2d::<u16>().unwrap();
    for frame in 0..6 {
        for module in 0..2 {
            assert_eq!(cell[[frame, module]], (frame % 2) as u16);
        }
    }

    let modules = file
        .dataset("entry_1/instrument_1/detector_1/module_identifier")
        .unwrap()
        .read_1d::<u64>()
        .unwrap();
    assert_eq!(modules.to_vec(), vec![0, 1]);

    // Alias links resolve to the canonical locations
    let linked = file
        .dataset("entry_1/data_1/data")
        .unwrap()
        .read_dyn::<f32>()
        .unwrap();
    assert_eq!(linked[[0, 0, 0, 0]], 0.0);
    let linked_ids = file
        .dataset("entry_1/instrument_1/detector_1/experiment_identifier")
        .unwrap()
        .read_1d::<VarLenUnicode>()
        .unwrap();
    assert_eq!(linked_ids[0].as_str(), "100:0");

    drop(file);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_partial_image_coverage_keeps_fill_value() {
    let dir = test_dir("partial");
    write_module_file(
        &dir.join("RAW-R0002-LPD00-S00000.h5"),
        0,
        &[100, 101, 102],
        &[2, 2, 2],
        &[0, 2, 4],
        6,
    );
    // Module 1 never recorded train 101
    write_module_file(
        &dir.join("RAW-R0002-LPD01-S00000.h5"),
        1,
        &[100, 101, 102],
        &[2, 0, 2],
        &[0, 2, 2],
        4,
    );

    let run = RunDirectory::open(&dir).unwrap();
    let detector = run.detector_sources().unwrap();
    let index = FrameIndex::new(&detector.train_ids, detector.frames_per_train).unwrap();
    let layouts = build_layouts(&index, &detector, &run).unwrap();

    // Partial coverage is a diagnostic, never an error
    let data_layout = layouts
        .iter()
        .find(|layout| layout.field.name == "data")
        .unwrap();
    assert!((data_layout.coverage().filled_fraction() - 10.0 / 12.0).abs() < 1e-12);
    assert!(!data_layout.coverage().is_complete());

    let out = dir.join("partial.cxi");
    let writer = CxiWriter::new(&out).unwrap();
    for layout in layouts.iter() {
        writer.write_layout(layout).unwrap();
    }
    drop(writer);

    let file = hdf5::File::open(&out).unwrap();
    let data = file
        .dataset("entry_1/instrument_1/detector_1/data")
        .unwrap()
        .read_dyn::<f32>()
        .unwrap();
    // Train 101 frames stay at the NaN fill for module 1 only
    assert!(data[[2, 1, 0, 0]].is_nan());
    assert!(data[[3, 1, 0, 0]].is_nan());
    assert_eq!(data[[2, 0, 0, 0]], 2.0);
    // Module 1 frames of train 102 follow directly after train 100 in storage
    assert_eq!(data[[4, 1, 0, 0]], 1002.0);

    let cell = file
        .dataset("entry_1/cellId")
        .unwrap()
        .read_2d::<u16>()
        .unwrap();
    assert_eq!(cell[[2, 1]], 0); // fill value
    assert_eq!(cell[[2, 0]], 0); // real pulse offset 0

    drop(file);
    let _ = std::fs::remove_dir_all(&dir);
}
