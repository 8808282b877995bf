use crate::base::N_MANDEL;
use crate::StrError;
use russell_lab::{mat_add, mat_inverse, mat_mat_mul, Matrix, Vector};
use russell_tensor::{t2_add, Mandel, Tensor2, SQRT_2_BY_3};
use std::f64::consts::SQRT_2;

/// Error raised when I − a N is not invertible with a positive determinant
const FLOW_MAP_ERROR: &str = "the flow map has a non-positive determinant";

/// Returns the 3×3 identity matrix
pub fn identity3() -> Matrix {
    Matrix::from(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
}

/// Returns the symmetric second-order identity tensor
pub fn identity_tensor() -> Tensor2 {
    let mut ii = Tensor2::new(Mandel::Symmetric);
    for i in 0..3 {
        ii.sym_set(i, i, 1.0);
    }
    ii
}

/// Computes c = a · b for 3×3 matrices
pub fn mat3_mul(a: &Matrix, b: &Matrix) -> Result<Matrix, StrError> {
    let mut c = Matrix::new(3, 3);
    mat_mat_mul(&mut c, 1.0, a, b, 0.0)?;
    Ok(c)
}

/// Returns the transpose of a 3×3 matrix
pub fn transpose3(a: &Matrix) -> Matrix {
    let mut at = Matrix::new(3, 3);
    for i in 0..3 {
        for j in 0..3 {
            at.set(i, j, a.get(j, i));
        }
    }
    at
}

/// Returns the trace of a 3×3 matrix
pub fn trace3(a: &Matrix) -> f64 {
    a.get(0, 0) + a.get(1, 1) + a.get(2, 2)
}

/// Returns the inverse and the determinant of a 3×3 matrix
pub fn inverse3(a: &Matrix) -> Result<(Matrix, f64), StrError> {
    let mut ai = Matrix::new(3, 3);
    let det = mat_inverse(&mut ai, a)?;
    Ok((ai, det))
}

/// Returns the symmetric part (a + aᵀ)/2 of a 3×3 matrix as a symmetric tensor
pub fn sym_tensor(a: &Matrix) -> Tensor2 {
    let mut t = Tensor2::new(Mandel::Symmetric);
    for i in 0..3 {
        for j in i..3 {
            t.sym_set(i, j, (a.get(i, j) + a.get(j, i)) / 2.0);
        }
    }
    t
}

/// Converts a 3×3 matrix into a general (non-symmetric) tensor
pub fn tensor_general(a: &Matrix) -> Result<Tensor2, StrError> {
    let mut data = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            data[i][j] = a.get(i, j);
        }
    }
    Tensor2::from_matrix(&data, Mandel::General)
}

/// Returns the deformation gradient F = I + ε for a strain given in Mandel components
pub fn deformation_from_strain(epsilon: &Vector) -> Result<Tensor2, StrError> {
    if epsilon.dim() != N_MANDEL {
        return Err("the strain vector must have 6 Mandel components");
    }
    let (xy, yz, xz) = (epsilon[3] / SQRT_2, epsilon[4] / SQRT_2, epsilon[5] / SQRT_2);
    let data = [
        [1.0 + epsilon[0], xy, xz],
        [xy, 1.0 + epsilon[1], yz],
        [xz, yz, 1.0 + epsilon[2]],
    ];
    Tensor2::from_matrix(&data, Mandel::General)
}

/// Returns the small strain ε = sym(F) − I
pub fn small_strain(ff: &Tensor2) -> Tensor2 {
    let mut epsilon = Tensor2::new(Mandel::Symmetric);
    t2_add(&mut epsilon, 1.0, &sym_tensor(&ff.as_matrix()), -1.0, &identity_tensor());
    epsilon
}

/// Returns the unit direction a/‖a‖ and the norm ‖a‖ of a symmetric tensor
///
/// The direction is zero if the norm is smaller than `tiny`.
pub fn unit_direction(a: &Tensor2, tiny: f64) -> (Tensor2, f64) {
    let norm = a.norm();
    let mut n = Tensor2::new(Mandel::Symmetric);
    if norm > tiny {
        n.set_tensor(1.0 / norm, a);
    }
    (n, norm)
}

/// Computes the equivalent strain ε = √(2/3) ‖dev E‖ with E = (FᵀF − I)/2 (Green-Lagrange)
///
/// Also returns the unit direction of dev(E).
pub fn equivalent_strain(ff: &Matrix) -> Result<(f64, Tensor2), StrError> {
    let cc = sym_tensor(&mat3_mul(&transpose3(ff), ff)?);
    let mut ee = Tensor2::new(Mandel::Symmetric);
    t2_add(&mut ee, 0.5, &cc, -0.5, &identity_tensor());
    let mut dev = Tensor2::new(Mandel::Symmetric);
    ee.deviator(&mut dev);
    let (n, norm) = unit_direction(&dev, 1e-15);
    Ok((SQRT_2_BY_3 * norm, n))
}

/// Computes the isochoric flow map M = (I − a N) / det(I − a N)^⅓
///
/// N is a symmetric direction.
pub fn isochoric_flow_map(nn: &Tensor2, amount: f64) -> Result<Matrix, StrError> {
    let nn = nn.as_matrix();
    let mut gg = Matrix::new(3, 3);
    mat_add(&mut gg, 1.0, &identity3(), -amount, &nn)?;
    let (_, det) = inverse3(&gg).map_err(|_| FLOW_MAP_ERROR)?;
    if !(det > 0.0) {
        return Err(FLOW_MAP_ERROR);
    }
    let factor = f64::powf(det, -1.0 / 3.0);
    let mut mm = Matrix::new(3, 3);
    mat_add(&mut mm, factor, &identity3(), -factor * amount, &nn)?;
    Ok(mm)
}

/// Computes the directional derivative δM of the isochoric flow map
///
/// With G = I − a N and g = det(G):
///
/// ```text
/// δG = −(δa N + a δN)
/// δM = g^(−⅓) (δG − ⅓ tr(G⁻¹ δG) G)
/// ```
pub fn isochoric_flow_map_deriv(nn: &Tensor2, amount: f64, dnn: &Tensor2, d_amount: f64) -> Result<Matrix, StrError> {
    let nn = nn.as_matrix();
    let mut gg = Matrix::new(3, 3);
    mat_add(&mut gg, 1.0, &identity3(), -amount, &nn)?;
    let (gi, det) = inverse3(&gg).map_err(|_| FLOW_MAP_ERROR)?;
    if !(det > 0.0) {
        return Err(FLOW_MAP_ERROR);
    }
    let mut dgg = Matrix::new(3, 3);
    mat_add(&mut dgg, -d_amount, &nn, -amount, &dnn.as_matrix())?;
    let w = trace3(&mat3_mul(&gi, &dgg)?);
    let factor = f64::powf(det, -1.0 / 3.0);
    let mut dmm = Matrix::new(3, 3);
    mat_add(&mut dmm, factor, &dgg, -factor * w / 3.0, &gg)?;
    Ok(dmm)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use russell_lab::{approx_eq, deriv1_central5, mat_approx_eq, vec_approx_eq};

    #[test]
    fn mat3_functions_work() {
        let a = Matrix::from(&[[2.0, 1.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 3.0]]);
        let c = mat3_mul(&a, &identity3()).unwrap();
        mat_approx_eq(&c, &a, 1e-15);
        let (ai, det) = inverse3(&a).unwrap();
        approx_eq(det, 6.0, 1e-14);
        let ii = mat3_mul(&a, &ai).unwrap();
        mat_approx_eq(&ii, &identity3(), 1e-15);
        assert_eq!(trace3(&a), 6.0);
        let at = transpose3(&a);
        assert_eq!(at.get(0, 2), 1.0);
        assert_eq!(at.get(2, 0), 0.0);
        let s = sym_tensor(&a);
        approx_eq(s.get(0, 1), 0.5, 1e-15);
        approx_eq(s.get(1, 0), 0.5, 1e-15);
        approx_eq(s.get(0, 2), 0.5, 1e-15);
    }

    #[test]
    fn strain_conversions_work() {
        let eps = Vector::from(&[0.01, -0.002, 0.0, 0.003, 0.0, -0.001]);
        let ff = deformation_from_strain(&eps).unwrap();
        let back = small_strain(&ff);
        vec_approx_eq(back.vector(), &eps, 1e-15);
        assert_eq!(
            deformation_from_strain(&Vector::new(3)).err(),
            Some("the strain vector must have 6 Mandel components")
        );
        let ii = identity_tensor();
        vec_approx_eq(ii.vector(), &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0], 1e-15);
    }

    #[test]
    fn unit_direction_works() {
        let mut a = Tensor2::new(Mandel::Symmetric);
        a.sym_set(0, 0, 3.0);
        a.sym_set(1, 1, 2.0);
        a.sym_set(2, 2, 1.0);
        let mut d = Tensor2::new(Mandel::Symmetric);
        a.deviator(&mut d);
        approx_eq(d.trace(), 0.0, 1e-15);
        let (n, norm) = unit_direction(&d, 1e-15);
        approx_eq(norm, f64::sqrt(2.0), 1e-15);
        approx_eq(n.norm(), 1.0, 1e-15);
        let (z, _) = unit_direction(&Tensor2::new(Mandel::Symmetric), 1e-15);
        assert_eq!(z.vector().as_data(), &[0.0; 6]);
    }

    #[test]
    fn equivalent_strain_works() {
        // simple shear with small γ: ε_eq ≈ γ/√3
        let gamma = 1e-6;
        let ff = Matrix::from(&[[1.0, gamma, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let (eps_eq, n) = equivalent_strain(&ff).unwrap();
        approx_eq(eps_eq, gamma / f64::sqrt(3.0), 1e-12);
        approx_eq(n.vector()[3], 1.0, 1e-6);
        let (zero, _) = equivalent_strain(&identity3()).unwrap();
        assert_eq!(zero, 0.0);
    }

    #[test]
    fn isochoric_flow_map_works() {
        let mut a = Tensor2::new(Mandel::Symmetric);
        a.sym_set(0, 0, 1.0);
        a.sym_set(1, 1, -0.5);
        a.sym_set(2, 2, -0.5);
        a.sym_set(0, 1, 0.3);
        let (n, _) = unit_direction(&a, 1e-15);
        let mm = isochoric_flow_map(&n, 0.05).unwrap();
        let (_, det) = inverse3(&mm).unwrap();
        approx_eq(det, 1.0, 1e-14);
        let zero = isochoric_flow_map(&n, 0.0).unwrap();
        mat_approx_eq(&zero, &identity3(), 1e-15);
        let mut nn = Tensor2::new(Mandel::Symmetric);
        nn.sym_set(0, 0, 1.0);
        assert_eq!(isochoric_flow_map(&nn, 2.0).err(), Some(FLOW_MAP_ERROR));
        assert_eq!(isochoric_flow_map(&nn, 1.0).err(), Some(FLOW_MAP_ERROR));
    }

    #[test]
    fn isochoric_flow_map_deriv_works() {
        let mut a = Tensor2::new(Mandel::Symmetric);
        a.sym_set(0, 0, 1.0);
        a.sym_set(1, 1, -0.4);
        a.sym_set(2, 2, -0.6);
        a.sym_set(1, 2, 0.2);
        let (n, _) = unit_direction(&a, 1e-15);
        let mut dn = Tensor2::new(Mandel::Symmetric);
        dn.sym_set(0, 1, 0.3);
        dn.sym_set(2, 2, -0.1);
        let (amount, d_amount) = (0.04, 0.7);
        let dmm = isochoric_flow_map_deriv(&n, amount, &dn, d_amount).unwrap();
        struct Args {
            n: Tensor2,
            dn: Tensor2,
            i: usize,
            j: usize,
        }
        let mut args = Args { n, dn, i: 0, j: 0 };
        for i in 0..3 {
            for j in 0..3 {
                args.i = i;
                args.j = j;
                let num = deriv1_central5(0.0, &mut args, |s, a| {
                    let mut ns = Tensor2::new(Mandel::Symmetric);
                    t2_add(&mut ns, 1.0, &a.n, s, &a.dn);
                    let mm = isochoric_flow_map(&ns, amount + s * d_amount)?;
                    Ok(mm.get(a.i, a.j))
                })
                .unwrap();
                approx_eq(dmm.get(i, j), num, 1e-9);
            }
        }

        // at zero amount only δa N survives (N is deviatoric)
        let dmm = isochoric_flow_map_deriv(&args.n, 0.0, &args.dn, 1.0).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                approx_eq(dmm.get(i, j), -args.n.get(i, j), 1e-15);
            }
        }
    }
}
