use super::{identity_tensor, inverse3, mat3_mul, sym_tensor, trace3, transpose3};
use crate::StrError;
use russell_lab::Matrix;
use russell_tensor::{t2_add, Mandel, Tensor2};

/// Error raised when det(F) is not positive
const JACOBIAN_ERROR: &str = "the Jacobian of the deformation gradient must be positive";

/// Implements a neo-Hookean network
///
/// Equilibrium network (compressible):
///
/// ```text
/// σ = μ/J (b − I) + λ ln(J)/J I
/// ```
///
/// Viscous network (deviatoric only):
///
/// ```text
/// σ = μ/J dev(b)
/// ```
///
/// where `b = F Fᵀ` is the left Cauchy-Green tensor and `J = det(F)`.
#[derive(Clone, Copy, Debug)]
pub struct NeoHookean {
    /// Shear modulus μ
    pub mu: f64,

    /// Lamé's λ (unused by deviatoric networks)
    pub lambda: f64,

    /// Includes the volumetric term
    pub volumetric: bool,
}

impl NeoHookean {
    /// Allocates a compressible network given the shear modulus and Poisson's coefficient
    pub fn new(mu: f64, poisson: f64) -> Self {
        NeoHookean {
            mu,
            lambda: 2.0 * mu * poisson / (1.0 - 2.0 * poisson),
            volumetric: true,
        }
    }

    /// Allocates a deviatoric network
    pub fn deviatoric(mu: f64) -> Self {
        NeoHookean {
            mu,
            lambda: 0.0,
            volumetric: false,
        }
    }

    /// Calculates the Cauchy stress given the (elastic) deformation gradient
    ///
    /// Returns an error if `J ≤ 0`.
    pub fn cauchy(&self, sigma: &mut Tensor2, ff: &Matrix) -> Result<(), StrError> {
        let (_, jj) = inverse3(ff).map_err(|_| JACOBIAN_ERROR)?;
        if !(jj > 0.0) {
            return Err(JACOBIAN_ERROR);
        }
        let bb = sym_tensor(&mat3_mul(ff, &transpose3(ff))?);
        let c = self.mu / jj;
        if self.volumetric {
            let shift = self.lambda * f64::ln(jj) / jj - c;
            t2_add(sigma, c, &bb, shift, &identity_tensor());
        } else {
            let mut dev = Tensor2::new(Mandel::Symmetric);
            bb.deviator(&mut dev);
            sigma.set_tensor(c, &dev);
        }
        Ok(())
    }

    /// Calculates the directional derivative δσ of the Cauchy stress along δF
    ///
    /// With `w = tr(F⁻¹ δF)` (so that `δJ = J w`) and `δb = 2 sym(δF Fᵀ)`.
    pub fn cauchy_deriv(&self, dsigma: &mut Tensor2, ff: &Matrix, dff: &Matrix) -> Result<(), StrError> {
        let (ffi, jj) = inverse3(ff).map_err(|_| JACOBIAN_ERROR)?;
        if !(jj > 0.0) {
            return Err(JACOBIAN_ERROR);
        }
        let w = trace3(&mat3_mul(&ffi, dff)?);
        let bb = sym_tensor(&mat3_mul(ff, &transpose3(ff))?);
        let hh = sym_tensor(&mat3_mul(dff, &transpose3(ff))?);
        let c = self.mu / jj;
        if self.volumetric {
            let mut tmp = Tensor2::new(Mandel::Symmetric);
            t2_add(&mut tmp, 2.0 * c, &hh, -c * w, &bb);
            let shift = c * w + self.lambda * w * (1.0 - f64::ln(jj)) / jj;
            t2_add(dsigma, 1.0, &tmp, shift, &identity_tensor());
        } else {
            let mut dev_h = Tensor2::new(Mandel::Symmetric);
            let mut dev_b = Tensor2::new(Mandel::Symmetric);
            hh.deviator(&mut dev_h);
            bb.deviator(&mut dev_b);
            t2_add(dsigma, 2.0 * c, &dev_h, -c * w, &dev_b);
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::NeoHookean;
    use crate::material::identity3;
    use russell_lab::{approx_eq, deriv1_central5, mat_add, Matrix};
    use russell_tensor::{Mandel, Tensor2};

    #[test]
    fn new_works() {
        let net = NeoHookean::new(760.0, 0.23);
        approx_eq(net.lambda, 2.0 * 760.0 * 0.23 / 0.54, 1e-12);
        assert!(net.volumetric);
        let dev = NeoHookean::deviatoric(790.0);
        assert_eq!(dev.lambda, 0.0);
        assert!(!dev.volumetric);
    }

    #[test]
    fn cauchy_is_zero_at_rest() {
        let net = NeoHookean::new(760.0, 0.23);
        let mut sigma = Tensor2::new(Mandel::Symmetric);
        net.cauchy(&mut sigma, &identity3()).unwrap();
        for v in sigma.vector().as_data() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn cauchy_matches_small_strain_elasticity() {
        let (mu, nu) = (760.0, 0.23);
        let net = NeoHookean::new(mu, nu);
        let e = 1e-6;
        let ff = Matrix::from(&[[1.0 + e, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let mut sigma = Tensor2::new(Mandel::Symmetric);
        net.cauchy(&mut sigma, &ff).unwrap();
        approx_eq(sigma.get(0, 0), (net.lambda + 2.0 * mu) * e, 1e-6);
        approx_eq(sigma.get(1, 1), net.lambda * e, 1e-6);

        let dev = NeoHookean::deviatoric(mu);
        dev.cauchy(&mut sigma, &ff).unwrap();
        let trace = sigma.get(0, 0) + sigma.get(1, 1) + sigma.get(2, 2);
        approx_eq(trace, 0.0, 1e-13);
        approx_eq(sigma.get(0, 0), 2.0 * mu * 2.0 * e / 3.0, 1e-6);
    }

    #[test]
    fn cauchy_captures_errors() {
        let net = NeoHookean::new(760.0, 0.23);
        let mut sigma = Tensor2::new(Mandel::Symmetric);
        let ff = Matrix::from(&[[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            net.cauchy(&mut sigma, &ff).err(),
            Some("the Jacobian of the deformation gradient must be positive")
        );
    }

    #[test]
    fn cauchy_deriv_matches_numerical_deriv() {
        let ff = Matrix::from(&[[1.04, 0.03, -0.01], [0.02, 0.97, 0.05], [0.0, -0.02, 1.01]]);
        let dff = Matrix::from(&[[0.3, -0.1, 0.2], [0.5, 0.1, 0.0], [-0.2, 0.4, -0.6]]);
        struct Args {
            net: NeoHookean,
            ff: Matrix,
            dff: Matrix,
            sigma: Tensor2,
            k: usize,
        }
        for net in [NeoHookean::new(760.0, 0.23), NeoHookean::deviatoric(790.0)] {
            let mut dsigma = Tensor2::new(Mandel::Symmetric);
            net.cauchy_deriv(&mut dsigma, &ff, &dff).unwrap();
            let mut args = Args {
                net,
                ff: ff.clone(),
                dff: dff.clone(),
                sigma: Tensor2::new(Mandel::Symmetric),
                k: 0,
            };
            for k in 0..6 {
                args.k = k;
                let num = deriv1_central5(0.0, &mut args, |s, a| {
                    let mut fs = Matrix::new(3, 3);
                    mat_add(&mut fs, 1.0, &a.ff, s, &a.dff)?;
                    a.net.cauchy(&mut a.sigma, &fs)?;
                    Ok(a.sigma.vector()[a.k])
                })
                .unwrap();
                approx_eq(dsigma.vector()[k], num, 1e-7);
            }
        }

        let mut dsigma = Tensor2::new(Mandel::Symmetric);
        let bad = Matrix::from(&[[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            NeoHookean::new(760.0, 0.23).cauchy_deriv(&mut dsigma, &bad, &dff).err(),
            Some("the Jacobian of the deformation gradient must be positive")
        );
    }
}
