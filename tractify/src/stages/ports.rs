//! Port contracts of the external processing stages.

/// Subject identifier.
pub const SUBJECT_ID: &str = "subject_id";
/// Session identifier.
pub const SESSION_ID: &str = "session_id";
/// Output directory of the tractography stage.
pub const OUTPUT_DIR: &str = "output_dir";
/// Structural (T1-weighted) image.
pub const T1_FILE: &str = "t1_file";
/// Post-processed diffusion image.
pub const EDDY_FILE: &str = "eddy_file";
/// Gradient vectors.
pub const BVEC: &str = "bvec";
/// Gradient values.
pub const BVAL: &str = "bval";
/// Template image.
pub const TEMPLATE: &str = "template";
/// Parcellation atlas.
pub const ATLAS: &str = "atlas";
/// Number of streamlines.
pub const NUM_TRACTS: &str = "num_tracts";
/// Averaged b0 reference (optional).
pub const EDDY_AVG_B0: &str = "eddy_avg_b0";
/// Diffusion brain mask (optional).
pub const EDDY_MASK: &str = "eddy_mask";
/// Output folder of the output writer.
pub const OUTPUT_FOLDER: &str = "output_folder";

/// Fiber orientation distribution image.
pub const FOD_FILE: &str = "fod_file";
/// Gray/white-matter interface image.
pub const GMWMI_FILE: &str = "gmwmi_file";
/// Probabilistic streamline weights.
pub const PROB_WEIGHTS: &str = "prob_weights";
/// Parcellation resampled into diffusion space.
pub const SHEN_DIFF_SPACE: &str = "shen_diff_space";
/// Inverse-length weighted connectivity matrix.
pub const INV_LEN_CONMAT: &str = "inv_len_conmat";
/// Length weighted connectivity matrix.
pub const LEN_CONMAT: &str = "len_conmat";

/// Inputs every session must bind before the tractography stage can run.
pub const TRACT_REQUIRED_INPUTS: [&str; 10] = [
    SUBJECT_ID, SESSION_ID, OUTPUT_DIR, T1_FILE, EDDY_FILE, BVEC, BVAL, TEMPLATE, ATLAS, NUM_TRACTS,
];

/// Inputs the tractography stage accepts but does not require.
pub const TRACT_OPTIONAL_INPUTS: [&str; 2] = [EDDY_AVG_B0, EDDY_MASK];

/// Outputs of the tractography stage.
pub const TRACT_OUTPUTS: [&str; 6] = [
    FOD_FILE, GMWMI_FILE, PROB_WEIGHTS, SHEN_DIFF_SPACE, INV_LEN_CONMAT, LEN_CONMAT,
];

/// Identification inputs of the output writer, bound statically.
pub const WRITER_STATIC_INPUTS: [&str; 3] = [SUBJECT_ID, SESSION_ID, OUTPUT_FOLDER];

/// All declared inputs of the tractography stage.
#[must_use]
pub fn tract_inputs() -> Vec<&'static str> {
    TRACT_REQUIRED_INPUTS
        .iter()
        .chain(TRACT_OPTIONAL_INPUTS.iter())
        .copied()
        .collect()
}

/// All declared inputs of the output writer.
#[must_use]
pub fn writer_inputs() -> Vec<&'static str> {
    TRACT_OUTPUTS
        .iter()
        .chain(WRITER_STATIC_INPUTS.iter())
        .copied()
        .collect()
}
