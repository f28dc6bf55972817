use super::model::{EnergyError, EnergyModel, Evaluation, check_len};
use super::parameterization::{ParameterizationError, Parameterizer};
use super::params::{ClassicalParams, LennardJonesParam, WaterModel};
use super::potentials;
use super::term::EnergyTerm;
use crate::core::models::molecule::Molecule;
use crate::core::models::receptor::Receptor;
use nalgebra::{Point3, Vector3};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionSettings {
    /// Scales the mixed r_min of every ligand-receptor pair.
    pub sigma_scale_factor: f64,
    pub relative_permittivity: f64,
    pub water_model: WaterModel,
    /// Pair potentials are shifted to zero at this distance.
    pub cutoff: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            sigma_scale_factor: 0.8,
            relative_permittivity: 4.0,
            water_model: WaterModel::Tip3p,
            cutoff: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SiteParams {
    vdw: Option<LennardJonesParam>,
    charge: f64,
}

/// Ligand-receptor Lennard-Jones plus screened Coulomb. The receptor is
/// fixed; only ligand atoms receive gradient.
pub struct LigandReceptorModel<'a> {
    receptor: &'a Receptor,
    settings: InteractionSettings,
    ligand: Vec<SiteParams>,
    /// `None` for receptor atoms left out (water under the `none` model).
    sites: Vec<Option<SiteParams>>,
}

impl<'a> LigandReceptorModel<'a> {
    pub fn new(
        receptor: &'a Receptor,
        ligand: &Molecule,
        forcefield: &ClassicalParams,
        settings: InteractionSettings,
    ) -> Result<Self, ParameterizationError> {
        let ligand_params = Parameterizer::new(forcefield).parameterize(ligand)?;
        let ligand = ligand_params
            .vdw
            .iter()
            .zip(&ligand_params.charges)
            .map(|(&vdw, &charge)| SiteParams {
                vdw: Some(vdw),
                charge,
            })
            .collect();

        let water = settings.water_model.parameters();
        let mut unparameterized = 0usize;
        let sites = receptor
            .atoms()
            .iter()
            .map(|atom| {
                if atom.is_water {
                    let water = water?;
                    return Some(if atom.element.is_hydrogen() {
                        SiteParams {
                            vdw: None,
                            charge: water.hydrogen_charge,
                        }
                    } else {
                        SiteParams {
                            vdw: Some(water.oxygen),
                            charge: water.oxygen_charge,
                        }
                    });
                }
                let vdw = forcefield.vdw(atom.element).copied();
                if vdw.is_none() {
                    unparameterized += 1;
                }
                Some(SiteParams {
                    vdw,
                    charge: atom.partial_charge,
                })
            })
            .collect();
        if unparameterized > 0 {
            debug!(
                count = unparameterized,
                forcefield = %forcefield.name,
                "Receptor atoms without VDW parameters contribute electrostatics only"
            );
        }

        Ok(Self {
            receptor,
            settings,
            ligand,
            sites,
        })
    }
}

impl EnergyModel for LigandReceptorModel<'_> {
    fn name(&self) -> &'static str {
        "ligand-receptor"
    }

    fn evaluate(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError> {
        check_len(coordinates, self.ligand.len())?;
        let cutoff = self.settings.cutoff;
        let mut terms = EnergyTerm::default();
        let mut gradient = vec![Vector3::zeros(); self.ligand.len()];

        for (i, (position, lig)) in coordinates.iter().zip(&self.ligand).enumerate() {
            for j in self.receptor.within(position, cutoff) {
                let Some(site) = self.sites[j] else {
                    continue;
                };
                let d = position - self.receptor.atoms()[j].position;
                let r = d.norm();
                let mut de_dr = 0.0;

                if let (Some(a), Some(b)) = (lig.vdw, site.vdw) {
                    let r_min = self.settings.sigma_scale_factor * 0.5 * (a.radius + b.radius);
                    let well_depth = (a.well_depth * b.well_depth).sqrt();
                    let (energy, derivative) = potentials::shift_to_cutoff(r, cutoff, |x| {
                        potentials::lennard_jones_12_6_with_derivative(x, r_min, well_depth)
                    });
                    terms.vdw += energy;
                    de_dr += derivative;
                }

                let (energy, derivative) = potentials::shift_to_cutoff(r, cutoff, |x| {
                    potentials::coulomb_with_derivative(
                        x,
                        lig.charge,
                        site.charge,
                        self.settings.relative_permittivity,
                    )
                });
                terms.coulomb += energy;
                de_dr += derivative;

                if r > 1e-12 {
                    gradient[i] += d * (de_dr / r);
                }
            }
        }

        Ok(Evaluation {
            terms,
            gradient: Some(gradient),
        })
    }
}
