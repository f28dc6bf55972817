/// Values used when neither the command line nor the config file set them.
/// The remaining optional settings take the library's own defaults.
pub struct DefaultsConfig {
    pub num_conf: usize,
    pub minimum_conf_rms: f64,
    pub ligand_force_field: String,
    pub use_ani: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            num_conf: 50,
            minimum_conf_rms: 0.5,
            ligand_force_field: "uff".to_string(),
            use_ani: false,
        }
    }
}
