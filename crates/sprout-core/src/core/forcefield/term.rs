use std::ops::{Add, AddAssign};

/// Energy broken down by contribution, in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    /// Bond stretching and angle bending.
    pub bonded: f64,
    pub vdw: f64,
    pub coulomb: f64,
    /// Learned-potential energy.
    pub network: f64,
}

impl EnergyTerm {
    pub fn new(bonded: f64, vdw: f64, coulomb: f64, network: f64) -> Self {
        Self {
            bonded,
            vdw,
            coulomb,
            network,
        }
    }

    pub fn network_only(network: f64) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.bonded + self.vdw + self.coulomb + self.network
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bonded: self.bonded + rhs.bonded,
            vdw: self.vdw + rhs.vdw,
            coulomb: self.coulomb + rhs.coulomb,
            network: self.network + rhs.network,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
