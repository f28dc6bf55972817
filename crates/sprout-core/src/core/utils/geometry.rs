use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

/// A rigid-body transform: `p' = rotation * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Superposition {
    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}

/// Proper rotation (no reflection) plus translation that best maps
/// `from_points` onto `to_points` in the least-squares sense (Kabsch).
pub fn superpose(from_points: &[Point3<f64>], to_points: &[Point3<f64>]) -> Option<Superposition> {
    if from_points.len() != to_points.len() {
        return None;
    }
    let from_centroid = centroid(from_points)?;
    let to_centroid = centroid(to_points)?;

    let h = from_points
        .iter()
        .zip(to_points.iter())
        .fold(Matrix3::zeros(), |acc, (f, t)| {
            acc + (t - to_centroid) * (f - from_centroid).transpose()
        });

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    let d = (u * v_t).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation = Rotation3::from_matrix_unchecked(u * correction * v_t);
    let translation = to_centroid.coords - rotation * from_centroid.coords;

    Some(Superposition {
        rotation,
        translation,
    })
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// RMSD between two coordinate sets after optimal superposition of the
/// first onto the second.
pub fn aligned_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    let fit = superpose(coords1, coords2)?;
    let moved: Vec<Point3<f64>> = coords1.iter().map(|p| fit.apply(p)).collect();
    calculate_rmsd(&moved, coords2)
}

/// Aligned RMSD restricted to a subset of atom indices.
pub fn aligned_rmsd_subset(
    coords1: &[Point3<f64>],
    coords2: &[Point3<f64>],
    indices: &[usize],
) -> Option<f64> {
    let a: Vec<Point3<f64>> = indices.iter().map(|&i| coords1.get(i).copied()).collect::<Option<_>>()?;
    let b: Vec<Point3<f64>> = indices.iter().map(|&i| coords2.get(i).copied()).collect::<Option<_>>()?;
    aligned_rmsd(&a, &b)
}

/// Smallest pairwise distance between two point sets, brute force.
pub fn min_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> Option<f64> {
    a.iter()
        .flat_map(|p| b.iter().map(move |q| (p - q).norm()))
        .min_by(|x, y| x.total_cmp(y))
}
