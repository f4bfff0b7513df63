//! # cxi_assembler
//!
//! cxi_assembler assembles the fragmented per-module data streams of a
//! multi-module X-ray detector run (AGIPD/LPD style) into one globally
//! addressable array and writes it as a CXI-style HDF5 file.
//!
//! Each physical detector module writes its own chunked stream of frames
//! tagged by an acquisition train id. Module streams can drop trains,
//! duplicate them, or arrive in a different order, so a physically
//! contiguous run of stored frames need not land in a contiguous region of
//! the assembled array. The library reconciles every chunk against the
//! global frame ordering derived from the sorted train ids, validates that
//! all modules agree on the per-frame pulse ids, and emits the assembled
//! arrays plus identifier metadata in the standard CXI layout.
//!
//! ## HDF5
//!
//! Before building and running cxi_assembler, HDF5 must be installed.
//! Typically this will be installed using a package manager (homebrew, apt,
//! etc), and the Rust libraries will auto detect the location of the HDF
//! install. However, this is not always possible. Sometimes a newer version
//! will need to be installed to a custom location. If this is the case,
//! write the following snippet into the file `.cargo/config.toml` in the
//! cxi_assembler repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ## Configuration
//!
//! The CLI reads a YAML configuration file:
//!
//! ```yml
//! run_path: /data/raw/r0123
//! output_path: /data/proc/r0123.cxi
//! ```
//!
//! ## Output
//!
//! The data format used in the output file is as follows:
//!
//! ```text
//! r0123.cxi
//! format_version(dset)
//! |---- entry_1
//! |    |---- experiment_identifier(dset)  "<trainId>:<pulseId>" per frame
//! |    |---- pulseId(dset), trainId(dset)
//! |    |---- cellId(dset) - axes
//! |    |---- data_1 -> instrument_1/detector_1
//! |    |---- instrument_1
//! |    |    |---- detector_1
//! |    |    |    |---- data(dset), gain(dset), mask(dset) - axes
//! |    |    |    |---- experiment_identifier -> /entry_1/experiment_identifier
//! |    |    |    |---- module_identifier(dset)
//! ```
//!
//! The assembled arrays have the fixed axis order (frame, module, y, x);
//! cells no module stream covered keep the field's fill value (NaN for the
//! image-type fields). The whole operation is a single-threaded, one-shot
//! batch transform: on any error, discard the output file and rerun.
pub mod chunk;
pub mod config;
pub mod cxi_writer;
pub mod error;
pub mod frame_index;
pub mod layout;
pub mod mapper;
pub mod process;
pub mod pulse_ids;
pub mod run_source;
