use super::intermolecular::LigandReceptorModel;
use super::model::{EnergyError, EnergyModel, Evaluation};
use nalgebra::Point3;

/// Intramolecular energy plus, when a receptor is present, the
/// ligand-receptor interaction.
pub struct HybridEnergy<'a> {
    intramolecular: Box<dyn EnergyModel + 'a>,
    intermolecular: Option<LigandReceptorModel<'a>>,
}

impl<'a> HybridEnergy<'a> {
    pub fn new(intramolecular: Box<dyn EnergyModel + 'a>, intermolecular: Option<LigandReceptorModel<'a>>) -> Self {
        Self {
            intramolecular,
            intermolecular,
        }
    }

    pub fn intramolecular_name(&self) -> &'static str {
        self.intramolecular.name()
    }
}

impl EnergyModel for HybridEnergy<'_> {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn evaluate(&self, coordinates: &[Point3<f64>]) -> Result<Evaluation, EnergyError> {
        let mut total = self.intramolecular.evaluate_with_gradient(coordinates)?;
        if let Some(inter) = &self.intermolecular {
            let interaction = inter.evaluate_with_gradient(coordinates)?;
            total.terms += interaction.terms;
            if let (Some(gradient), Some(extra)) = (total.gradient.as_mut(), interaction.gradient) {
                gradient.iter_mut().zip(extra).for_each(|(g, h)| *g += h);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::classical::ClassicalLigandModel;
    use crate::core::forcefield::intermolecular::InteractionSettings;
    use crate::core::forcefield::learned::{LearnedPotential, tests::tiny_model};
    use crate::core::forcefield::params::ClassicalParams;
    use crate::core::models::element::Element;
    use crate::core::models::molecule::tests::ethane;
    use crate::core::models::receptor::{Receptor, ReceptorAtom};

    fn receptor() -> Receptor {
        Receptor::new(
            "pocket",
            vec![
                ReceptorAtom::new(Element::O, "OD1", "ASP", Point3::new(0.5, 3.2, 0.0)),
                ReceptorAtom::new(Element::C, "CB", "ALA", Point3::new(1.0, -3.5, 0.5)),
            ],
        )
    }

    #[test]
    fn hybrid_sums_intra_and_intermolecular_parts() {
        let mol = ethane();
        let uff = ClassicalParams::builtin("uff").unwrap();
        let rec = receptor();
        let coords = mol.positions().unwrap();

        let intra = ClassicalLigandModel::new(&mol, &uff).unwrap();
        let inter = LigandReceptorModel::new(&rec, &mol, &uff, InteractionSettings::default()).unwrap();
        let expected = intra.evaluate(&coords).unwrap().energy() + inter.evaluate(&coords).unwrap().energy();
        let expected_gradient: Vec<_> = intra
            .evaluate(&coords)
            .unwrap()
            .gradient
            .unwrap()
            .iter()
            .zip(inter.evaluate(&coords).unwrap().gradient.unwrap())
            .map(|(a, b)| a + b)
            .collect();

        let hybrid = HybridEnergy::new(Box::new(intra), Some(inter));
        let evaluation = hybrid.evaluate(&coords).unwrap();
        assert!((evaluation.energy() - expected).abs() < 1e-9);
        for (g, e) in evaluation.gradient.unwrap().iter().zip(&expected_gradient) {
            assert!((g - e).norm() < 1e-9);
        }
        assert_eq!(hybrid.intramolecular_name(), "classical");
    }

    #[test]
    fn learned_intramolecular_part_reports_network_term() {
        let mol = ethane();
        let coords = mol.positions().unwrap();
        let learned = LearnedPotential::new(tiny_model(), &mol).unwrap();
        let hybrid = HybridEnergy::new(Box::new(learned), None);
        let evaluation = hybrid.evaluate(&coords).unwrap();
        assert_eq!(evaluation.terms.vdw, 0.0);
        assert_ne!(evaluation.terms.network, 0.0);
        assert_eq!(hybrid.name(), "hybrid");
    }
}
